//! The Kerberos V5 mechanism: context establishment (`spec.md` §4.5),
//! per-message wrap/unwrap (`spec.md` §4.6), and the `KerberosEngine`
//! capability seam (`spec.md` §6) that those two lean on.

pub mod context;
pub mod engine;
pub mod local;
pub mod message;
pub mod wire;

pub use context::Krb5Context;
pub use engine::KerberosEngine;
pub use mechanism::Krb5Mechanism;

mod mechanism;
