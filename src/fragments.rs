use gloo_net::http::Request;
use log::{error, info, warn};
use web_sys::Document;
use yew::prelude::*;

use crate::config::FragmentConfig;
use crate::dom;
use crate::error::FragmentError;
use crate::tabs;

/// Marker the footer fragment carries; its presence means the mount is already filled.
pub const FOOTER_MARKER: &str = ".site-footer";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Fragment {
    Header,
    Footer,
}

impl Fragment {
    pub fn mount_id(self) -> &'static str {
        match self {
            Fragment::Header => "header-container",
            Fragment::Footer => "footer-container",
        }
    }

    pub fn source(self, path: &str, config: &FragmentConfig) -> String {
        match self {
            Fragment::Header => config.header.clone(),
            Fragment::Footer if is_confirm_page(path, config) => config.footer_confirm.clone(),
            Fragment::Footer => config.footer.clone(),
        }
    }
}

/// Confirm and thanks pages have no floating call-to-action, so they use a
/// different footer.
pub fn is_confirm_page(path: &str, config: &FragmentConfig) -> bool {
    let page = path.rsplit('/').next().unwrap_or_default();
    config
        .confirm_pages
        .iter()
        .any(|p| page == p || path.contains(p.as_str()))
}

pub async fn fetch_fragment(url: &str) -> Result<String, FragmentError> {
    let response = Request::get(url)
        .send()
        .await
        .map_err(|source| FragmentError::Network {
            url: url.to_string(),
            source,
        })?;

    if !response.ok() {
        return Err(FragmentError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    response.text().await.map_err(|source| FragmentError::Body {
        url: url.to_string(),
        source,
    })
}

#[derive(Properties, PartialEq)]
pub struct FragmentProps {
    pub fragment: Fragment,
    pub url: AttrValue,
    pub on_loaded: Callback<Fragment>,
}

#[function_component]
pub fn FragmentHost(props: &FragmentProps) -> Html {
    let markup = use_state(|| None::<AttrValue>);

    // Fetch once per url
    {
        let markup = markup.clone();
        use_effect_with_deps(
            move |url: &AttrValue| {
                let url = url.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    match fetch_fragment(&url).await {
                        Ok(html) => markup.set(Some(AttrValue::from(html))),
                        Err(e) => error!("Failed to load fragment: {}", e),
                    }
                });
                || ()
            },
            props.url.clone(),
        );
    }

    // Runs after the markup is in the document
    {
        let on_loaded = props.on_loaded.clone();
        let fragment = props.fragment;
        use_effect_with_deps(
            move |markup: &Option<AttrValue>| {
                if markup.is_some() {
                    on_loaded.emit(fragment);
                }
                || ()
            },
            (*markup).clone(),
        );
    }

    match &*markup {
        Some(html) => Html::from_html_unchecked(html.clone()),
        None => html! {},
    }
}

pub fn mount(document: &Document, fragment: Fragment, path: &str, config: &FragmentConfig) {
    let Some(container) = document.get_element_by_id(fragment.mount_id()) else {
        warn!("#{} not found", fragment.mount_id());
        return;
    };

    if fragment == Fragment::Footer && dom::query(&container, FOOTER_MARKER).is_some() {
        return;
    }

    let url = fragment.source(path, config);
    info!("Loading {:?} from {}", fragment, url);

    let on_loaded = {
        let document = document.clone();
        let container = container.clone();
        let path = path.to_string();
        let root_page = config.root_page.clone();
        Callback::from(move |fragment: Fragment| match fragment {
            Fragment::Header => tabs::highlight(&document, &path, &root_page),
            Fragment::Footer => {
                dom::set_style(&container, "display", "block");
                dom::set_style(&container, "position", "relative");
            }
        })
    };

    yew::Renderer::<FragmentHost>::with_root_and_props(
        container,
        FragmentProps {
            fragment,
            url: url.into(),
            on_loaded,
        },
    )
    .render();
}
