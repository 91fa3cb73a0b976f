//! Safe redirects
//!
//! Redirect targets are checked against a host allowlist seeded with the
//! site's own host. A target outside the list is replaced by the site home.
//! Extra hosts can be trusted for a single check without widening the policy.

use reqwest::Url;

pub const STRIPE_CHECKOUT_HOST: &str = "checkout.stripe.com";

/// Host allowlist for redirect targets
#[derive(Clone, Debug)]
pub struct RedirectPolicy {
    home: Url,
    allowed_hosts: Vec<String>,
}

impl RedirectPolicy {
    pub fn new(home: Url) -> Self {
        let allowed_hosts = home
            .host_str()
            .map(|h| vec![h.to_ascii_lowercase()])
            .unwrap_or_default();
        Self {
            home,
            allowed_hosts,
        }
    }

    /// Validated target, or the site home when `location` is not allowed
    pub fn safe(&self, location: &str) -> Url {
        match self.home.join(location.trim()) {
            Ok(url) if self.is_allowed(&url, None) => url,
            _ => {
                tracing::warn!(location = %location, "Redirect target not allowed, using home");
                self.home.clone()
            }
        }
    }

    /// Whether `url` may be redirected to, trusting `extra_host` for this check only
    pub fn is_allowed(&self, url: &Url, extra_host: Option<&str>) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
            return false;
        };
        self.allowed_hosts.iter().any(|h| *h == host)
            || extra_host.is_some_and(|h| h.eq_ignore_ascii_case(&host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RedirectPolicy {
        RedirectPolicy::new(Url::parse("https://shop.test/").unwrap())
    }

    #[test]
    fn test_same_host_and_relative_allowed() {
        let p = policy();
        assert_eq!(p.safe("https://shop.test/pay?x=1").as_str(), "https://shop.test/pay?x=1");
        assert_eq!(p.safe("/thanks").as_str(), "https://shop.test/thanks");
    }

    #[test]
    fn test_foreign_host_falls_back_home() {
        let p = policy();
        assert_eq!(p.safe("https://evil.example/").as_str(), "https://shop.test/");
        assert_eq!(p.safe("javascript:alert(1)").as_str(), "https://shop.test/");
        assert_eq!(p.safe("//evil.example/x").as_str(), "https://shop.test/");
    }

    #[test]
    fn test_extra_host_scoped_to_one_call() {
        let p = policy();
        let hosted = "https://checkout.stripe.com/c/pay/cs_123";
        let url = Url::parse(hosted).unwrap();
        assert!(p.is_allowed(&url, Some(STRIPE_CHECKOUT_HOST)));
        assert!(!p.is_allowed(&url, None));
        assert_eq!(p.safe(hosted).as_str(), "https://shop.test/");
    }
}
