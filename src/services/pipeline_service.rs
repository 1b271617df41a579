use std::sync::Arc;

use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::services::ingest_service::IngestService;
use crate::services::planner_service::{PlanSummary, PlannerService};
use crate::services::reconcile_service::{ReconcileService, ReconcileSummary};
use crate::services::template_service::TemplateExpander;
use crate::services::time_service::Clock;

/// Everything a pipeline run needs, passed explicitly: store handles,
/// configuration and the clock. No process-wide mutable state.
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub task_pool: DbPool,
    pub calendar_pool: DbPool,
    pub clock: Clock,
}

impl PipelineContext {
    pub fn bootstrap(config: PipelineConfig, clock: Clock) -> AppResult<Self> {
        config.ensure_dirs()?;
        let task_pool = DbPool::task_store(config.task_db_path())?;
        let calendar_pool = DbPool::calendar(config.calendar_db_path())?;
        calendar_pool.ensure_calendar_schema()?;

        Ok(Self {
            config,
            task_pool,
            calendar_pool,
            clock,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub reconciled: Option<ReconcileSummary>,
    pub ingested: Option<usize>,
    pub plan: Option<PlanSummary>,
}

/// Runs Reconcile -> Ingest -> Plan as one sequence. The first two steps
/// log failures and let the rest continue; a failing plan step is terminal
/// and surfaces to the caller.
#[derive(Clone)]
pub struct PipelineService {
    context: Arc<PipelineContext>,
}

impl PipelineService {
    pub fn new(context: Arc<PipelineContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn run(&self, source: &str) -> AppResult<PipelineReport> {
        let context = &self.context;
        info!(target: "app::pipeline", %source, "pipeline triggered");

        let mut report = PipelineReport::default();

        let reconciler = ReconcileService::new(
            context.task_pool.clone(),
            context.calendar_pool.clone(),
            context.config.missed_task_policy,
        );
        match reconciler.run() {
            Ok(summary) => report.reconciled = Some(summary),
            Err(err) => error!(target: "app::pipeline", error = %err, "reconcile step failed"),
        }

        let ingestor = IngestService::new(context.task_pool.clone(), context.config.inputs_dir());
        match ingestor.run() {
            Ok(inserted) => report.ingested = Some(inserted),
            Err(err) => error!(target: "app::pipeline", error = %err, "ingest step failed"),
        }

        let template = TemplateExpander::load_template(&context.config.template_path())?;
        let planner = PlannerService::new(
            context.task_pool.clone(),
            context.calendar_pool.clone(),
            &context.config,
        );
        report.plan = Some(planner.run(&template, context.clock.now_local())?);

        info!(target: "app::pipeline", %source, "pipeline completed");
        Ok(report)
    }
}
