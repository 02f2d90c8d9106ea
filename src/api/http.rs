use async_trait::async_trait;
use gloo_net::http::{Request, RequestBuilder, Response};
use gloo_timers::callback::Timeout;
use log::{debug, warn};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use web_sys::AbortController;

use super::{DataQuery, GraphApi, SaveConnectionsRequest, SuggestRequest};
use crate::config::EngineConfig;
use crate::error::{GraphError, Result};
use crate::model::{
	BuildRequest, ConnectionSuggestion, DocumentRef, Graph, GraphConfig, GraphId, RawGraphData,
};

/// `fetch`-backed client for the graph backend.
#[derive(Clone, Debug)]
pub struct HttpGraphApi {
	base_url: String,
	user_id: String,
	document_timeout_ms: u32,
}

#[derive(Deserialize)]
struct SuggestResponse {
	#[serde(default)]
	connections: Vec<ConnectionSuggestion>,
}

impl HttpGraphApi {
	/// Client for the configured backend.
	pub fn new(config: &EngineConfig) -> Self {
		Self {
			base_url: config.api_base_url.trim_end_matches('/').to_string(),
			user_id: config.user_id.clone(),
			document_timeout_ms: config.document_timeout_ms,
		}
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.base_url, path)
	}

	fn graph_url(&self, id: &GraphId, suffix: &str) -> String {
		self.url(&format!("/graphs/{}{}", encode(id), suffix))
	}

	async fn send(&self, builder: RequestBuilder) -> Result<Response> {
		let response = builder
			.send()
			.await
			.map_err(|e| GraphError::Network(e.to_string()))?;
		check_status(response).await
	}

	async fn send_json<B: serde::Serialize>(&self, builder: RequestBuilder, body: &B) -> Result<Response> {
		let request = builder
			.json(body)
			.map_err(|e| GraphError::Decode(e.to_string()))?;
		let response = request
			.send()
			.await
			.map_err(|e| GraphError::Network(e.to_string()))?;
		check_status(response).await
	}
}

async fn check_status(response: Response) -> Result<Response> {
	if response.ok() {
		return Ok(response);
	}
	let status = response.status();
	let message = match response.text().await {
		Ok(text) if !text.trim().is_empty() => error_detail(&text),
		_ => response.status_text(),
	};
	warn!("backend answered {status}: {message}");
	Err(GraphError::Server { status, message })
}

/// Pull `detail`/`message`/`error` out of a JSON error body, else the raw text.
fn error_detail(text: &str) -> String {
	serde_json::from_str::<serde_json::Value>(text)
		.ok()
		.and_then(|v| {
			["detail", "message", "error"]
				.iter()
				.find_map(|k| v.get(*k).and_then(|d| d.as_str()).map(str::to_string))
		})
		.unwrap_or_else(|| text.trim().to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
	let text = response
		.text()
		.await
		.map_err(|e| GraphError::Decode(e.to_string()))?;
	Ok(serde_json::from_str(&text)?)
}

fn encode(segment: &str) -> String {
	String::from(js_sys::encode_uri_component(segment))
}

#[async_trait(?Send)]
impl GraphApi for HttpGraphApi {
	async fn list_graphs(&self) -> Result<Vec<Graph>> {
		debug!("GET /graphs");
		let builder = Request::get(&self.url("/graphs")).query([("user_id", self.user_id.as_str())]);
		decode(self.send(builder).await?).await
	}

	async fn create_graph(&self, config: &GraphConfig) -> Result<Graph> {
		debug!("POST /graphs name={:?}", config.name);
		let builder = Request::post(&self.url("/graphs")).query([("user_id", self.user_id.as_str())]);
		decode(self.send_json(builder, config).await?).await
	}

	async fn update_graph(&self, id: &GraphId, config: &GraphConfig) -> Result<Graph> {
		debug!("PUT /graphs/{id}");
		let builder = Request::put(&self.graph_url(id, ""));
		decode(self.send_json(builder, config).await?).await
	}

	async fn delete_graph(&self, id: &GraphId) -> Result<()> {
		debug!("DELETE /graphs/{id}");
		self.send(Request::delete(&self.graph_url(id, ""))).await?;
		Ok(())
	}

	async fn trigger_build(&self, id: &GraphId, request: &BuildRequest) -> Result<()> {
		debug!("POST /graphs/{id}/build {request:?}");
		let builder = Request::post(&self.graph_url(id, "/build"));
		self.send_json(builder, request).await?;
		Ok(())
	}

	async fn graph_data(&self, id: &GraphId, query: &DataQuery) -> Result<RawGraphData> {
		debug!("GET /graphs/{id}/data {query:?}");
		let include = if query.include_connections { "true" } else { "false" };
		let mut params = vec![("include_connections", include)];
		if let Some(target) = query.target_graph_id.as_deref() {
			params.push(("target_graph_id", target));
		}
		let builder = Request::get(&self.graph_url(id, "/data")).query(params);
		decode(self.send(builder).await?).await
	}

	async fn suggest_connections(
		&self,
		id: &GraphId,
		request: &SuggestRequest,
	) -> Result<Vec<ConnectionSuggestion>> {
		debug!("POST /graphs/{id}/connections/suggest target={}", request.target_graph_id);
		let builder = Request::post(&self.graph_url(id, "/connections/suggest"));
		let body: SuggestResponse = decode(self.send_json(builder, request).await?).await?;
		Ok(body.connections)
	}

	async fn save_connections(&self, id: &GraphId, request: &SaveConnectionsRequest) -> Result<()> {
		debug!(
			"POST /graphs/{id}/connections target={} count={}",
			request.target_graph_id,
			request.connections.len()
		);
		let builder = Request::post(&self.graph_url(id, "/connections"));
		self.send_json(builder, request).await?;
		Ok(())
	}

	async fn list_documents(&self) -> Result<Vec<DocumentRef>> {
		debug!("GET /documents");
		let controller =
			AbortController::new().map_err(|e| GraphError::Network(format!("{e:?}")))?;
		let signal = controller.signal();
		let timeout_ms = self.document_timeout_ms;
		let timer = Timeout::new(timeout_ms, move || controller.abort());

		let builder = Request::get(&self.url("/documents"))
			.query([("user_id", self.user_id.as_str())])
			.abort_signal(Some(&signal));
		let result = builder.send().await;
		let aborted = signal.aborted();
		// Dropping the timer before it fires cancels it.
		drop(timer);

		let response = match result {
			Ok(response) => response,
			Err(_) if aborted => return Err(GraphError::Timeout(timeout_ms)),
			Err(e) => return Err(GraphError::Network(e.to_string())),
		};
		decode(check_status(response).await?).await
	}
}
