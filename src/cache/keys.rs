use sha2::{Digest, Sha256};

pub struct CacheKeys;

impl CacheKeys {
    /// Upstream access review response: review:{hash}
    ///
    /// The hash covers the bearer token as well as the request, so two
    /// callers holding different tokens never share an entry.
    pub fn access_review(bearer: &str, method: &str, url: &str, body: &[u8]) -> String {
        let mut hasher = Sha256::new();

        hasher.update(b"token:");
        hasher.update(bearer.as_bytes());
        hasher.update(b"\x00");

        hasher.update(b"method:");
        hasher.update(method.as_bytes());
        hasher.update(b"\x00");

        hasher.update(b"url:");
        hasher.update(url.as_bytes());
        hasher.update(b"\x00");

        hasher.update(b"body:");
        hasher.update(body);

        format!("review:{}", hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://ams.example.com/api/authorizations/v1/access_review";
    const BODY: &[u8] = br#"{"action":"get","account_username":"alice","organization_id":"org-1","resource_type":"Logs"}"#;

    #[test]
    fn test_access_review_key_is_stable() {
        let a = CacheKeys::access_review("Bearer t1", "POST", URL, BODY);
        let b = CacheKeys::access_review("Bearer t1", "POST", URL, BODY);
        assert_eq!(a, b);
        assert!(a.starts_with("review:"));
        assert_eq!(a.len(), "review:".len() + 64);
    }

    #[test]
    fn test_access_review_key_binds_token() {
        let a = CacheKeys::access_review("Bearer t1", "POST", URL, BODY);
        let b = CacheKeys::access_review("Bearer t2", "POST", URL, BODY);
        assert_ne!(a, b);
    }

    #[test]
    fn test_access_review_key_binds_request() {
        let base = CacheKeys::access_review("Bearer t1", "POST", URL, BODY);
        assert_ne!(base, CacheKeys::access_review("Bearer t1", "POST", URL, b"{}"));
        assert_ne!(base, CacheKeys::access_review("Bearer t1", "PUT", URL, BODY));
        assert_ne!(
            base,
            CacheKeys::access_review("Bearer t1", "POST", "https://other.example.com", BODY)
        );
    }

    #[test]
    fn test_access_review_key_field_boundaries() {
        // Shifting bytes between adjacent fields must not produce the same key.
        let a = CacheKeys::access_review("Bearer ab", "POST", URL, BODY);
        let b = CacheKeys::access_review("Bearer a", "bPOST", URL, BODY);
        assert_ne!(a, b);
    }
}
