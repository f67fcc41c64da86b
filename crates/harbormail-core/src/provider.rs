//! Supported mail providers and their connection presets

use harbormail_imap::FolderLayout;
use harbormail_smtp::Tls;

use crate::{CoreError, CoreResult};

/// Connection preset for one supported provider
#[derive(Debug, Clone)]
pub struct Provider {
    /// Domain the provider serves, e.g. "gmail.com"
    pub domain: &'static str,
    /// IMAP server hostname
    pub imap_host: &'static str,
    /// IMAP server port
    pub imap_port: u16,
    /// SMTP server hostname
    pub smtp_host: &'static str,
    /// SMTP server port
    pub smtp_port: u16,
    /// How the SMTP connection is secured
    pub smtp_tls: Tls,
    /// How the provider arranges its special folders
    pub folder_layout: FolderLayout,
}

/// Registry of supported providers, keyed by address domain.
///
/// Built once at startup and handed to the components that need it;
/// the table never changes while the process runs.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    /// The providers this client supports
    pub fn with_defaults() -> Self {
        Self {
            providers: vec![
                Provider {
                    domain: "gmail.com",
                    imap_host: "imap.gmail.com",
                    imap_port: 993,
                    smtp_host: "smtp.gmail.com",
                    smtp_port: 465,
                    smtp_tls: Tls::Implicit,
                    folder_layout: FolderLayout::FlagClassified {
                        special_path: "[Gmail]",
                    },
                },
                Provider {
                    domain: "ukr.net",
                    imap_host: "imap.ukr.net",
                    imap_port: 993,
                    smtp_host: "smtp.ukr.net",
                    smtp_port: 465,
                    smtp_tls: Tls::Implicit,
                    folder_layout: FolderLayout::FixedNames {
                        inbox: "Inbox",
                        sent: "Sent",
                        drafts: "Drafts",
                        bin: "Trash",
                        hidden: &["Spam"],
                    },
                },
            ],
        }
    }

    /// Look up a provider by domain
    pub fn for_domain(&self, domain: &str) -> Option<&Provider> {
        self.providers
            .iter()
            .find(|p| p.domain.eq_ignore_ascii_case(domain))
    }

    /// Resolve the provider for a full email address
    pub fn for_address(&self, email: &str) -> CoreResult<&Provider> {
        let domain = email.rsplit_once('@').map(|(_, d)| d).unwrap_or(email);
        self.for_domain(domain)
            .ok_or_else(|| CoreError::UnsupportedProvider(domain.to_string()))
    }

    /// Domains of all supported providers
    pub fn domains(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.providers.iter().map(|p| p.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gmail_preset() {
        let registry = ProviderRegistry::with_defaults();
        let provider = registry.for_address("kate@gmail.com").unwrap();

        assert_eq!(provider.imap_host, "imap.gmail.com");
        assert_eq!(provider.imap_port, 993);
        assert_eq!(provider.smtp_host, "smtp.gmail.com");
        assert_eq!(provider.smtp_port, 465);
        assert_eq!(provider.smtp_tls, Tls::Implicit);
        assert!(matches!(
            provider.folder_layout,
            FolderLayout::FlagClassified { special_path: "[Gmail]" }
        ));
    }

    #[test]
    fn test_ukr_net_preset() {
        let registry = ProviderRegistry::with_defaults();
        let provider = registry.for_address("olena@ukr.net").unwrap();

        assert_eq!(provider.imap_host, "imap.ukr.net");
        match &provider.folder_layout {
            FolderLayout::FixedNames { bin, hidden, .. } => {
                assert_eq!(*bin, "Trash");
                assert!(hidden.contains(&"Spam"));
            }
            other => panic!("unexpected layout: {:?}", other),
        }
    }

    #[test]
    fn test_domain_lookup_ignores_case() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.for_address("kate@GMAIL.com").is_ok());
        assert!(registry.for_domain("Ukr.Net").is_some());
    }

    #[test]
    fn test_unknown_domain_is_unsupported() {
        let registry = ProviderRegistry::with_defaults();

        match registry.for_address("someone@i.ua") {
            Err(CoreError::UnsupportedProvider(domain)) => assert_eq!(domain, "i.ua"),
            other => panic!("expected UnsupportedProvider, got {:?}", other.map(|_| ())),
        }

        assert!(registry.for_address("not-an-address").is_err());
    }

    #[test]
    fn test_registry_lists_its_domains() {
        let registry = ProviderRegistry::with_defaults();
        let domains: Vec<&str> = registry.domains().collect();
        assert_eq!(domains, vec!["gmail.com", "ukr.net"]);
    }
}
