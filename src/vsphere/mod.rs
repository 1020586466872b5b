//! vSphere implementation of the inventory over the Web Services JSON binding.
//!
//! Every managed object method is reachable as
//! `{server}/sdk/vim25/{release}/{type}/{id}/{method}` and every property as
//! a `GET` on `{type}/{id}/{property}`. A session token obtained at login is
//! sent on each request.

mod error;
mod wire;

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::VsphereError;

use crate::config::VsphereConfig;
use crate::inventory::{
    Inventory, InventoryFuture, ManagedObjectRef, ObjectKind, TaskInfo, TaskMethod,
};
use wire::{
    CloneSpecBody, CloneVmBody, FindByInventoryPathBody, LoginBody, MoRef, ServiceContent,
    SnapshotInfo, TaskInfoBody,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const SESSION_HEADER: &str = "vmware-api-session-id";
const USER_AGENT: &str = concat!("vmclone/", env!("CARGO_PKG_VERSION"));
const DEFAULT_SEARCH_INDEX: &str = "SearchIndex";
/// Maximum length of a fault message kept from a response body.
const MAX_FAULT_MESSAGE_LENGTH: usize = 200;

/// Authenticated client for one vCenter session.
#[derive(Clone, Debug)]
pub struct VsphereClient {
    http: Client,
    base_url: String,
    session: String,
    search_index: ManagedObjectRef,
}

impl VsphereClient {
    /// Opens a session against the configured server and discovers the
    /// search index.
    ///
    /// # Errors
    ///
    /// Returns [`VsphereError::Config`] when the configuration is invalid,
    /// [`VsphereError::Fault`] when login is refused, and
    /// [`VsphereError::MissingSession`] when the server returns no token.
    pub async fn connect(config: &VsphereConfig) -> Result<Self, VsphereError> {
        config.validate()?;
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(config.allow_unverified_ssl)
            .build()
            .map_err(|err| VsphereError::Config(err.to_string()))?;
        let base_url = format!(
            "{}/sdk/vim25/{}",
            config.server.trim().trim_end_matches('/'),
            config.api_release.trim()
        );

        let session = Self::login(&http, &base_url, config).await?;
        let mut client = Self {
            http,
            base_url,
            session,
            search_index: ManagedObjectRef::new(ObjectKind::SearchIndex, DEFAULT_SEARCH_INDEX),
        };

        let content_path = "ServiceInstance/ServiceInstance/content";
        let body = client
            .call(Method::GET, content_path, None::<&()>)
            .await?;
        let content: ServiceContent =
            client.decode(content_path, client.require(content_path, body)?)?;
        client.search_index = ManagedObjectRef::from(content.search_index);
        tracing::debug!(search_index = %client.search_index, "vSphere session established");
        Ok(client)
    }

    async fn login(
        http: &Client,
        base_url: &str,
        config: &VsphereConfig,
    ) -> Result<String, VsphereError> {
        let url = format!("{base_url}/SessionManager/SessionManager/Login");
        tracing::debug!(%url, user = %config.user, "opening vSphere session");
        let response = http
            .post(&url)
            .json(&LoginBody {
                user_name: config.user.trim(),
                password: &config.password,
            })
            .send()
            .await
            .map_err(|err| VsphereError::Http {
                url: url.clone(),
                message: err.to_string(),
            })?;

        let status = response.status();
        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(fault_from(status, &body));
        }
        session.ok_or(VsphereError::MissingSession)
    }

    async fn call<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<Value>, VsphereError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = format!("{}/{path}", self.base_url);
        tracing::debug!(%method, %url, "vSphere request");

        let mut request = self
            .http
            .request(method, &url)
            .header(SESSION_HEADER, &self.session);
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|err| VsphereError::Http {
            url: url.clone(),
            message: err.to_string(),
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|err| VsphereError::Http {
            url: url.clone(),
            message: err.to_string(),
        })?;

        if !status.is_success() {
            let fault = fault_from(status, &text);
            tracing::warn!(%url, error = %fault, "vSphere request failed");
            return Err(fault);
        }
        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(&text).map_err(|err| VsphereError::Decode {
            url,
            message: err.to_string(),
        })?;
        Ok((!value.is_null()).then_some(value))
    }

    fn require(&self, path: &str, value: Option<Value>) -> Result<Value, VsphereError> {
        value.ok_or_else(|| VsphereError::Decode {
            url: format!("{}/{path}", self.base_url),
            message: String::from("empty response body"),
        })
    }

    fn decode<T: DeserializeOwned>(&self, path: &str, value: Value) -> Result<T, VsphereError> {
        serde_json::from_value(value).map_err(|err| VsphereError::Decode {
            url: format!("{}/{path}", self.base_url),
            message: err.to_string(),
        })
    }

    async fn property(
        &self,
        object: &ManagedObjectRef,
        property: &str,
    ) -> Result<(String, Option<Value>), VsphereError> {
        let path = format!("{}/{}/{property}", object.kind, object.value);
        let value = self.call(Method::GET, &path, None::<&()>).await?;
        Ok((path, value))
    }

    async fn invoke_task<B>(
        &self,
        target: &ManagedObjectRef,
        method_name: &str,
        body: Option<&B>,
    ) -> Result<ManagedObjectRef, VsphereError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let path = format!("{}/{}/{method_name}", target.kind, target.value);
        let value = self.call(Method::POST, &path, body).await?;
        let task: MoRef = self.decode(&path, self.require(&path, value)?)?;
        Ok(ManagedObjectRef::from(task))
    }
}

impl Inventory for VsphereClient {
    type Error = VsphereError;

    fn find_by_inventory_path<'a>(
        &'a self,
        path: &'a str,
    ) -> InventoryFuture<'a, Option<ManagedObjectRef>, Self::Error> {
        Box::pin(async move {
            let endpoint = format!("SearchIndex/{}/FindByInventoryPath", self.search_index.value);
            let body = FindByInventoryPathBody {
                inventory_path: path,
            };
            let Some(value) = self.call(Method::POST, &endpoint, Some(&body)).await? else {
                return Ok(None);
            };
            let found: MoRef = self.decode(&endpoint, value)?;
            Ok(Some(ManagedObjectRef::from(found)))
        })
    }

    fn current_snapshot<'a>(
        &'a self,
        vm: &'a ManagedObjectRef,
    ) -> InventoryFuture<'a, Option<ManagedObjectRef>, Self::Error> {
        Box::pin(async move {
            let (path, value) = self.property(vm, "snapshot").await?;
            let Some(value) = value else {
                return Ok(None);
            };
            let info: SnapshotInfo = self.decode(&path, value)?;
            Ok(info.current_snapshot.map(ManagedObjectRef::from))
        })
    }

    fn display_name<'a>(
        &'a self,
        object: &'a ManagedObjectRef,
    ) -> InventoryFuture<'a, String, Self::Error> {
        Box::pin(async move {
            let (path, value) = self.property(object, "name").await?;
            self.decode(&path, self.require(&path, value)?)
        })
    }

    fn submit<'a>(
        &'a self,
        target: &'a ManagedObjectRef,
        method: &'a TaskMethod,
    ) -> InventoryFuture<'a, ManagedObjectRef, Self::Error> {
        Box::pin(async move {
            let method_name = method.action().method_name();
            match method {
                TaskMethod::CloneVm { folder, name, spec } => {
                    let body = CloneVmBody {
                        folder: MoRef::from(folder),
                        name,
                        spec: CloneSpecBody::from(spec),
                    };
                    self.invoke_task(target, method_name, Some(&body)).await
                }
                TaskMethod::PowerOff | TaskMethod::Destroy => {
                    self.invoke_task(target, method_name, None::<&()>).await
                }
            }
        })
    }

    fn task_info<'a>(
        &'a self,
        task: &'a ManagedObjectRef,
    ) -> InventoryFuture<'a, TaskInfo, Self::Error> {
        Box::pin(async move {
            let (path, value) = self.property(task, "info").await?;
            let body: TaskInfoBody = self.decode(&path, self.require(&path, value)?)?;
            body.into_task_info().map_err(|message| VsphereError::Decode {
                url: format!("{}/{path}", self.base_url),
                message,
            })
        })
    }
}

fn fault_from(status: StatusCode, body: &str) -> VsphereError {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let fault = parsed
        .as_ref()
        .and_then(wire::fault_type)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("HTTP error").to_owned());
    let message = parsed.as_ref().map_or_else(
        || sanitize_message(body),
        |value| sanitize_message(&wire::fault_message(value)),
    );
    VsphereError::Fault {
        status: status.as_u16(),
        fault,
        message,
    }
}

/// Truncates long bodies and replaces control characters with spaces so
/// fault text is safe to log on one line.
fn sanitize_message(body: &str) -> String {
    let cleaned: String = body
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .take(MAX_FAULT_MESSAGE_LENGTH)
        .collect();
    if body.chars().count() > MAX_FAULT_MESSAGE_LENGTH {
        format!("{cleaned}... [truncated]")
    } else {
        cleaned
    }
}
