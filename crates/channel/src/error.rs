use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChannelError {
    #[snafu(display("channel parameter '{parameter}' is not configured"))]
    MissingParameter {
        stage: &'static str,
        parameter: &'static str,
    },
    #[snafu(display("channel '{channel_id}' is not supported"))]
    UnsupportedChannel {
        stage: &'static str,
        channel_id: String,
    },
    #[snafu(display("failed to build http client on `{stage}`: {source}"))]
    BuildHttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("request to {url} failed on `{stage}`: {source}"))]
    Request {
        stage: &'static str,
        url: String,
        source: reqwest::Error,
    },
    #[snafu(display("channel endpoint returned status {status}: {body}"))]
    Status {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to read event stream on `{stage}`: {source}"))]
    StreamRead {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("event stream was terminated by the server with `{event}`"))]
    StreamTerminated { stage: &'static str, event: String },
    #[snafu(display("failed to decode event payload on `{stage}`: {source}"))]
    DecodeEvent {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("channel is closed"))]
    Closed { stage: &'static str },
}

pub type ChannelResult<T> = Result<T, ChannelError>;
