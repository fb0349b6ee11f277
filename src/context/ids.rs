//! Request and span identifiers.

/// Fresh identifier, `svc:<uuid v4>`.
pub fn new_request_id() -> String {
    format!("svc:{}", uuid::Uuid::new_v4())
}

/// Identifier of a sub context: `<parent>:<suffix>`.
pub fn sub_id(parent: &str, suffix: &str) -> String {
    format!("{}:{}", parent, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_format() {
        let id = new_request_id();
        let uuid = id.strip_prefix("svc:").unwrap();
        assert!(uuid::Uuid::parse_str(uuid).is_ok());
        assert_ne!(new_request_id(), id);
    }

    #[test]
    fn test_sub_id() {
        assert_eq!(sub_id("svc:1", "job"), "svc:1:job");
    }
}
