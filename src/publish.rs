use miette::{IntoDiagnostic, WrapErr};
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::result::{bail, Error, Result};

/// Interface for posting a publicly reachable video to the social account
pub trait MediaPublisher {
    /// Create a media container for the video then publish it.
    ///
    /// Return the published media ID.
    fn publish(&self, video_url: &str) -> Result<String>;
}

/// Instagram Graph API client, publishing videos as Reels
#[derive(Debug)]
pub struct GraphPublisher {
    client: Client,
    api_base: String,
    account_id: String,
    access_token: String,
    caption: String,
}

impl GraphPublisher {
    pub fn new(
        api_base: &str,
        account_id: &str,
        access_token: &str,
        caption: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .build()
            .into_diagnostic()
            .wrap_err("Could not build Graph API HTTP client")?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_owned(),
            account_id: account_id.to_owned(),
            access_token: access_token.to_owned(),
            caption: caption.to_owned(),
        })
    }

    fn endpoint(&self, edge: &str) -> String {
        format!("{}/{}/{edge}", self.api_base, self.account_id)
    }

    /// First step: ask the platform to fetch the video into a new container.
    /// Return the container ID (`creation_id`).
    pub fn create_container(&self, video_url: &str) -> Result<String> {
        let json = self
            .post_form(
                &self.endpoint("media"),
                &[
                    ("video_url", video_url),
                    ("caption", &self.caption),
                    ("access_token", &self.access_token),
                    ("media_type", "REELS"),
                ],
            )
            .map_err(|err| err.wrap_err_with(|| "Could not create media container"))?;

        response_id(&json).ok_or_else(|| Error::CreateMedia(json.to_string()))
    }

    /// Second step: publish a container. Return the published media ID.
    pub fn publish_container(&self, creation_id: &str) -> Result<String> {
        let json = self
            .post_form(
                &self.endpoint("media_publish"),
                &[
                    ("creation_id", creation_id),
                    ("access_token", &self.access_token),
                ],
            )
            .map_err(|err| err.wrap_err_with(|| "Could not publish media container"))?;

        response_id(&json).ok_or_else(|| Error::Publish(json.to_string()))
    }

    /// POST the form and parse the response body as a JSON object, whatever
    /// the status code.
    ///
    /// Transport errors and bodies that are not a JSON object are fatal.
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Value> {
        debug!("POST {url}");
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .into_diagnostic()
            .wrap_err_with(|| format!("Request to {url} failed"))?;

        let status = response.status();
        let body = response
            .text()
            .into_diagnostic()
            .wrap_err("Could not read Graph API response")?;
        debug!("{status}: {body}");

        match serde_json::from_str::<Value>(&body) {
            Ok(json @ Value::Object(_)) => Ok(json),
            Ok(_) => bail(format!("Unexpected Graph API response ({status}): {body}")),
            Err(err) => bail(format!("Graph API response is not JSON ({status}, {err}): {body}")),
        }
    }
}

impl MediaPublisher for GraphPublisher {
    fn publish(&self, video_url: &str) -> Result<String> {
        let creation_id = self.create_container(video_url)?;
        debug!("Created media container {creation_id}");
        self.publish_container(&creation_id)
    }
}

/// Success is only inferred from an `id` key in the response object.
/// Error payloads and status codes are not inspected.
fn response_id(json: &Value) -> Option<String> {
    match json.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
