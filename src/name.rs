//! Names: a byte string paired with an OID name-type.
//!
//! Grounded in `examples/original_source/lib/internal.h`'s
//! `gss_name_struct` (`length`, `value`, `type`) and the name-type OIDs
//! declared in `examples/original_source/lib/krb5.h`.

use crate::oid::Oid;

/// A name, polymorphic over name-type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub value: Vec<u8>,
    pub name_type: Oid,
}

impl Name {
    pub fn new(value: impl Into<Vec<u8>>, name_type: Oid) -> Self {
        Name {
            value: value.into(),
            name_type,
        }
    }

    /// Build a hostbased-service name from `service@hostname`-shaped text,
    /// e.g. `Name::hostbased_service("host/example.test")`.
    pub fn hostbased_service(text: impl AsRef<str>) -> Self {
        Name::new(text.as_ref().as_bytes().to_vec(), hostbased_service_name_type())
    }

    /// Build a Kerberos principal name from `primary/instance@REALM`-shaped text.
    pub fn kerberos_principal(text: impl AsRef<str>) -> Self {
        Name::new(text.as_ref().as_bytes().to_vec(), kerberos_principal_name_type())
    }

    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }
}

/// `GSS_KRB5_NT_PRINCIPAL_NAME`: `1.2.840.113554.1.2.2.1`.
pub fn kerberos_principal_name_type() -> Oid {
    Oid::from_dotted("1.2.840.113554.1.2.2.1").expect("valid static OID")
}

/// `GSS_C_NT_HOSTBASED_SERVICE` (the krb5 mechanism's generic service-name
/// form): `1.2.840.113554.1.2.1.4`.
pub fn hostbased_service_name_type() -> Oid {
    Oid::from_dotted("1.2.840.113554.1.2.1.4").expect("valid static OID")
}

/// `GSS_KRB5_NT_USER_NAME`: `1.2.840.113554.1.2.1.1`. Declared for API-shape
/// parity with `krb5.h`; no mechanism operation in this crate canonicalizes
/// into it today.
pub fn user_name_type() -> Oid {
    Oid::from_dotted("1.2.840.113554.1.2.1.1").expect("valid static OID")
}

/// `GSS_KRB5_NT_STRING_UID_NAME`: `1.2.840.113554.1.2.1.3`. See
/// [`user_name_type`] for why this is exposed unused.
pub fn string_uid_name_type() -> Oid {
    Oid::from_dotted("1.2.840.113554.1.2.1.3").expect("valid static OID")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostbased_service_carries_the_right_name_type() {
        let name = Name::hostbased_service("host/example.test");
        assert_eq!(name.name_type, hostbased_service_name_type());
        assert_eq!(name.as_str_lossy(), "host/example.test");
    }
}
