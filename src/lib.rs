//! A Generic Security Service core: mechanism-agnostic peer authentication,
//! key establishment, and per-message integrity/confidentiality, with
//! Kerberos V5 as the one mechanism this crate registers.
//!
//! The generic surface lives in [`surface`]; the Kerberos V5 mechanism lives
//! in [`krb5`]; [`mech`] is the seam between them. See the crate's
//! `DESIGN.md` for how each module is grounded.

pub mod context;
pub mod credential;
pub mod error;
pub mod krb5;
pub mod mech;
pub mod name;
pub mod oid;
pub mod oid_set;
pub mod surface;
pub mod token;

pub use context::{Context, ContextFlags, ContextStatus, Role, SecContextStep};
pub use credential::{CredUsage, Credential};
pub use error::{Error, MajorStatus, Result};
pub use name::Name;
pub use oid::Oid;
pub use oid_set::OidSet;
pub use surface::{
    accept_sec_context, acquire_cred, context_time, delete_sec_context, export_sec_context, get_mic, import_sec_context,
    init_sec_context, inquire_context, inquire_cred, process_context_token, release_cred, release_name, unwrap, verify_mic,
    wrap, wrap_size_limit, CredentialInfo, SecContextOutput,
};
