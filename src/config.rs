use log::{warn, Level};
use serde::Deserialize;
use web_sys::Document;

use crate::viewport::{Action, Stagger, Subscription};

#[cfg(debug_assertions)]
pub fn log_level() -> Level {
    Level::Debug // verbose while developing locally
}

#[cfg(not(debug_assertions))]
pub fn log_level() -> Level {
    Level::Info
}

/// Id of the optional `<script type="application/json">` block that overrides defaults.
pub const CONFIG_ELEMENT_ID: &str = "site-config";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    pub fragments: FragmentConfig,
    pub faq: FaqConfig,
    pub consent: ConsentConfig,
    pub flow: FlowConfig,
    pub reveals: Vec<Subscription>,
    pub backgrounds: BackgroundConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            fragments: FragmentConfig::default(),
            faq: FaqConfig::default(),
            consent: ConsentConfig::default(),
            flow: FlowConfig::default(),
            reveals: default_reveals(),
            backgrounds: BackgroundConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Reads the page's config block, falling back to defaults when it is
    /// missing or malformed.
    pub fn load(document: &Document) -> Self {
        let Some(raw) = document
            .get_element_by_id(CONFIG_ELEMENT_ID)
            .and_then(|el| el.text_content())
        else {
            return Self::default();
        };

        match Self::from_json(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring malformed #{}: {}", CONFIG_ELEMENT_ID, e);
                Self::default()
            }
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Every viewport subscription on the page: the reveal animations followed
    /// by one preload subscription per background entry.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        let mut subs = self.reveals.clone();
        subs.extend(self.backgrounds.images.iter().map(|bg| Subscription {
            selector: bg.selector.clone(),
            threshold: self.backgrounds.threshold,
            root_margin: self.backgrounds.root_margin.clone(),
            once: true,
            action: Action::Preload {
                href: bg.image.clone(),
            },
        }));
        subs
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FragmentConfig {
    pub header: String,
    pub footer: String,
    pub footer_confirm: String,
    /// Pages that get the confirm footer (no floating call-to-action).
    pub confirm_pages: Vec<String>,
    /// Page id an empty filename resolves to.
    pub root_page: String,
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            header: "./header.html".to_string(),
            footer: "./footer.html".to_string(),
            footer_confirm: "./footer-confirm.html".to_string(),
            confirm_pages: vec![
                "contact-mail.php".to_string(),
                "contact-thanks.html".to_string(),
            ],
            root_page: "index.html".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FaqConfig {
    pub open_label: String,
    pub close_label: String,
}

impl Default for FaqConfig {
    fn default() -> Self {
        Self {
            open_label: "開く".to_string(),
            close_label: "閉じる".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ConsentConfig {
    pub tolerance_px: f64,
    pub close_delay_ms: u32,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            tolerance_px: 10.0,
            close_delay_ms: 300,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FlowConfig {
    pub stagger_ms: u32,
    /// Matches the CSS transition on `.flow__step`.
    pub settle_ms: u32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            stagger_ms: 50,
            settle_ms: 800,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Background {
    pub selector: String,
    pub image: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BackgroundConfig {
    pub threshold: f64,
    pub root_margin: String,
    pub images: Vec<Background>,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        let images = [
            (".area", "./img/area/area-bg.jpg"),
            (".risk", "./img/risk/risk-bg.png"),
            (".price", "./img/price/price-bg.svg"),
            (".voice", "./img/voice/voice-bg.png"),
            (".contact", "./img/contact/contact-bg.png"),
        ]
        .into_iter()
        .map(|(selector, image)| Background {
            selector: selector.to_string(),
            image: image.to_string(),
        })
        .collect();

        Self {
            threshold: 0.01,
            root_margin: "50px".to_string(),
            images,
        }
    }
}

pub fn default_reveals() -> Vec<Subscription> {
    vec![
        Subscription {
            selector: ".about".to_string(),
            threshold: 0.5,
            root_margin: "0px".to_string(),
            once: true,
            action: Action::Stagger {
                targets: ".about__comment".to_string(),
                class: "is-active".to_string(),
                step: Stagger::Responsive {
                    breakpoint_px: 768.0,
                    narrow_ms: 100,
                    wide_ms: 300,
                },
            },
        },
        Subscription {
            selector: ".risk".to_string(),
            threshold: 0.2,
            root_margin: "0px".to_string(),
            once: true,
            action: Action::Stagger {
                targets: ".risk__card".to_string(),
                class: "is-active".to_string(),
                step: Stagger::Fixed { interval_ms: 200 },
            },
        },
        Subscription {
            selector: ".price__card-image-after".to_string(),
            threshold: 0.3,
            root_margin: "0px 0px -50px 0px".to_string(),
            once: true,
            action: Action::Delay {
                class: "is-active".to_string(),
                delay_ms: 300,
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_block_keeps_site_defaults() {
        let config = SiteConfig::from_json("{}").unwrap();
        assert_eq!(config, SiteConfig::default());
        assert_eq!(config.consent.tolerance_px, 10.0);
        assert_eq!(config.flow.settle_ms, 800);
        assert_eq!(config.reveals.len(), 3);
    }

    #[test]
    fn partial_sections_override_single_fields() {
        let config =
            SiteConfig::from_json(r#"{ "consent": { "close_delay_ms": 500 }, "flow": { "stagger_ms": 80 } }"#)
                .unwrap();
        assert_eq!(config.consent.close_delay_ms, 500);
        assert_eq!(config.consent.tolerance_px, 10.0);
        assert_eq!(config.flow.stagger_ms, 80);
        assert_eq!(config.flow.settle_ms, 800);
    }

    #[test]
    fn explicit_reveals_replace_defaults() {
        let config = SiteConfig::from_json(
            r#"{ "reveals": [
                { "selector": ".voice", "threshold": 0.4,
                  "action": { "kind": "delay", "class": "is-active", "delay_ms": 150 } }
            ] }"#,
        )
        .unwrap();
        assert_eq!(config.reveals.len(), 1);
        assert_eq!(config.reveals[0].root_margin, "0px");
        assert!(config.reveals[0].once);
        assert_eq!(
            config.reveals[0].action,
            Action::Delay {
                class: "is-active".to_string(),
                delay_ms: 150
            }
        );
    }

    #[test]
    fn backgrounds_become_one_shot_preloads() {
        let config = SiteConfig::default();
        let subs = config.subscriptions();
        assert_eq!(subs.len(), 8);

        let preloads: Vec<_> = subs
            .iter()
            .filter(|s| matches!(s.action, Action::Preload { .. }))
            .collect();
        assert_eq!(preloads.len(), 5);
        assert!(preloads
            .iter()
            .all(|s| s.once && s.root_margin == "50px" && s.threshold == 0.01));
        assert_eq!(
            preloads[1].action,
            Action::Preload {
                href: "./img/risk/risk-bg.png".to_string()
            }
        );
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(SiteConfig::from_json("{ not json").is_err());
        assert!(SiteConfig::from_json(r#"{ "flow": { "stagger_ms": "fast" } }"#).is_err());
    }
}
