use thiserror::Error;

#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("request for {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: gloo_net::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("could not read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: gloo_net::Error,
    },
}
