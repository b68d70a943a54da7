use std::sync::Arc;

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    tool, tool_handler, tool_router,
    schemars::JsonSchema,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use threadline_core::graph::NodeRef;
use threadline_core::models::*;
use threadline_core::{EngineError, Filter};

use crate::commands::{format_elapsed, AppEngine};

#[derive(Clone)]
pub struct McpServer {
    engine: Arc<Mutex<AppEngine>>,
    tool_router: ToolRouter<Self>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListProblemsRequest {
    #[schemars(description = "Only problems of this persona")]
    pub persona_id: Option<String>,
    #[schemars(description = "Only problems of this objective")]
    pub objective_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddProblemRequest {
    #[schemars(description = "Short title of the problem")]
    pub title: String,
    pub description: Option<String>,
    pub persona_id: Option<String>,
    pub objective_id: Option<String>,
    pub gap_id: Option<String>,
    #[schemars(description = "Nest the problem under this parent problem")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProblemRequest {
    #[schemars(description = "The problem ID")]
    pub problem_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddThreadItemRequest {
    #[schemars(description = "The problem the item belongs to")]
    pub problem_id: String,
    #[schemars(description = "Text of the item")]
    pub content: String,
    #[schemars(description = "General, Insight, Bottleneck, Task, Action or Session")]
    #[serde(default = "default_thread_type")]
    pub thread_type: String,
    #[schemars(description = "Reply to this thread item instead of starting a root item")]
    pub reply_to: Option<String>,
}

fn default_thread_type() -> String {
    ThreadType::General.as_str().to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ChangeThreadTypeRequest {
    pub thread_id: String,
    #[schemars(description = "General, Insight, Bottleneck, Task, Action or Session")]
    pub thread_type: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EntityRequest {
    #[schemars(description = "Entity kind in snake_case, e.g. problem or thread_item")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StartSessionRequest {
    #[schemars(description = "The thread item to time")]
    pub thread_id: String,
}

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub phase: String,
    pub thread_id: Option<String>,
    pub elapsed_seconds: i64,
    pub elapsed: String,
}

impl McpServer {
    pub fn new(engine: AppEngine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            tool_router: Self::tool_router(),
        }
    }

    fn parse_kind(s: &str) -> Result<EntityKind, McpError> {
        EntityKind::from_str(s)
            .filter(|kind| *kind != EntityKind::ActiveSession)
            .ok_or_else(|| McpError::invalid_params(format!("Unknown entity kind: {}", s), None))
    }

    fn parse_type(s: &str) -> Result<ThreadType, McpError> {
        ThreadType::from_str(s)
            .ok_or_else(|| McpError::invalid_params(format!("Unknown thread type: {}", s), None))
    }

    fn json<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    fn records<'a, T: Entity + 'a>(items: impl IntoIterator<Item = &'a T>) -> Result<Vec<Value>, McpError> {
        items
            .into_iter()
            .map(|item| {
                item.to_record()
                    .map(Value::Object)
                    .map_err(|e| McpError::internal_error(e.to_string(), None))
            })
            .collect()
    }

    fn status_of(engine: &AppEngine) -> SessionStatus {
        let elapsed = engine.session_elapsed();
        SessionStatus {
            phase: engine.session().phase().to_string(),
            thread_id: engine.session().thread_id().map(str::to_string),
            elapsed_seconds: elapsed,
            elapsed: format_elapsed(elapsed),
        }
    }
}

fn engine_error(err: EngineError) -> McpError {
    match err {
        EngineError::NotFound { .. }
        | EngineError::Locked { .. }
        | EngineError::SlotOccupied { .. }
        | EngineError::InvalidStateTransition { .. } => McpError::invalid_params(err.to_string(), None),
        _ => McpError::internal_error(err.to_string(), None),
    }
}

#[tool_router]
impl McpServer {
    #[tool(description = "List personas with the ids of their problems")]
    async fn list_personas(&self) -> Result<CallToolResult, McpError> {
        let engine = self.engine.lock().await;
        Self::json(&Self::records(engine.all::<Persona>().iter())?)
    }

    #[tool(description = "List objectives with their gaps")]
    async fn list_objectives(&self) -> Result<CallToolResult, McpError> {
        let engine = self.engine.lock().await;
        let mut out = Vec::new();
        for objective in engine.all::<Objective>().iter() {
            let gaps: Vec<&Gap> = objective
                .gap_ids
                .iter()
                .filter_map(|id| engine.get::<Gap>(id))
                .collect();
            out.push(serde_json::json!({
                "objective": Self::records([objective])?.pop(),
                "gaps": Self::records(gaps)?,
            }));
        }
        Self::json(&out)
    }

    #[tool(description = "List problems, optionally limited to a persona or an objective")]
    async fn list_problems(
        &self,
        params: Parameters<ListProblemsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let filter = match (req.persona_id, req.objective_id) {
            (Some(id), _) => Filter::eq("persona_id", id),
            (None, Some(id)) => Filter::eq("objective_id", id),
            (None, None) => Filter::All,
        };

        let mut engine = self.engine.lock().await;
        engine.fetch::<Problem>(filter.clone()).await.map_err(engine_error)?;
        let problems = Self::records(engine.all::<Problem>().iter())?;
        let problems: Vec<Value> = problems
            .into_iter()
            .filter(|p| p.as_object().is_some_and(|record| filter.matches(record)))
            .collect();
        Self::json(&problems)
    }

    #[tool(description = "Create a problem under a persona, objective, gap or parent problem")]
    async fn add_problem(
        &self,
        params: Parameters<AddProblemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let mut problem = Problem::new(req.title);
        problem.description = req.description;
        problem.persona_id = req.persona_id;
        problem.objective_id = req.objective_id;
        problem.gap_id = req.gap_id;
        problem.parent_id = req.parent_id;

        let mut engine = self.engine.lock().await;
        let problem = engine.add(problem).await.map_err(engine_error)?;
        Self::json(&Self::records([&problem])?)
    }

    #[tool(description = "Get all thread items of a problem, oldest first")]
    async fn get_thread(
        &self,
        params: Parameters<ProblemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let mut engine = self.engine.lock().await;
        engine
            .fetch::<ThreadItem>(Filter::eq("problem_id", req.problem_id.as_str()))
            .await
            .map_err(engine_error)?;
        let items = engine
            .all::<ThreadItem>()
            .iter()
            .filter(|item| item.problem_id == req.problem_id);
        Self::json(&Self::records(items)?)
    }

    #[tool(description = "Add a thread item to a problem, optionally as a reply")]
    async fn add_thread_item(
        &self,
        params: Parameters<AddThreadItemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let mut item = ThreadItem::new(req.problem_id, Self::parse_type(&req.thread_type)?, req.content);
        item.parent_id = req.reply_to;

        let mut engine = self.engine.lock().await;
        let item = engine.add(item).await.map_err(engine_error)?;
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Thread item added with id: {}",
            item.id
        ))]))
    }

    #[tool(description = "Change the type of a thread item, resetting type-specific fields")]
    async fn change_thread_type(
        &self,
        params: Parameters<ChangeThreadTypeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let ty = Self::parse_type(&req.thread_type)?;
        let mut engine = self.engine.lock().await;
        let item = engine
            .change_thread_type(&req.thread_id, ty)
            .await
            .map_err(engine_error)?;
        Self::json(&Self::records([&item])?)
    }

    #[tool(description = "Get any entity by kind and id")]
    async fn get_entity(
        &self,
        params: Parameters<EntityRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let kind = Self::parse_kind(&req.kind)?;
        let engine = self.engine.lock().await;
        let record = engine
            .cache()
            .record(kind, &req.id)
            .ok_or_else(|| McpError::invalid_params(format!("{} not found: {}", kind, req.id), None))?
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Self::json(&record)
    }

    #[tool(description = "Delete an entity and everything it owns")]
    async fn delete_entity(
        &self,
        params: Parameters<EntityRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let kind = Self::parse_kind(&req.kind)?;
        let mut engine = self.engine.lock().await;
        let removed = engine
            .delete_node(NodeRef::new(kind, req.id))
            .await
            .map_err(engine_error)?;
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Removed {} entities",
            removed
        ))]))
    }

    #[tool(description = "Start timing work on a thread item")]
    async fn start_session(
        &self,
        params: Parameters<StartSessionRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let mut engine = self.engine.lock().await;
        engine.start_session(&req.thread_id).await.map_err(engine_error)?;
        Self::json(&Self::status_of(&engine))
    }

    #[tool(description = "Pause the running session")]
    async fn pause_session(&self) -> Result<CallToolResult, McpError> {
        let mut engine = self.engine.lock().await;
        engine.pause_session().await.map_err(engine_error)?;
        Self::json(&Self::status_of(&engine))
    }

    #[tool(description = "Resume the paused session")]
    async fn resume_session(&self) -> Result<CallToolResult, McpError> {
        let mut engine = self.engine.lock().await;
        engine.resume_session().await.map_err(engine_error)?;
        Self::json(&Self::status_of(&engine))
    }

    #[tool(description = "Stop the session and record it as a Session thread item")]
    async fn stop_session(&self) -> Result<CallToolResult, McpError> {
        let mut engine = self.engine.lock().await;
        let item = engine.stop_session().await.map_err(engine_error)?;
        Self::json(&Self::records([&item])?)
    }

    #[tool(description = "Get the session timer state and elapsed time")]
    async fn session_status(&self) -> Result<CallToolResult, McpError> {
        let engine = self.engine.lock().await;
        Self::json(&Self::status_of(&engine))
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Threadline MCP server: personas, objectives, problems, thread items and session timing".into(),
            ),
            ..Default::default()
        }
    }
}

pub async fn run_stdio_server(engine: AppEngine) -> anyhow::Result<()> {
    use tokio::io::{stdin, stdout};

    tracing::info!("Starting MCP server via stdio");

    let service = McpServer::new(engine);
    let server = service.serve((stdin(), stdout())).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!("MCP server stopped: {:?}", quit_reason);

    Ok(())
}
