use std::sync::Arc;

use chronodb_core::{
    AlteredSchedule, ChronoConfig, CoreResult, DropChunks, IntegerNow, Job, JobId,
    LicenseProvider, Materializer, Principal, ReorderChunk, ScheduleUpdate,
};

use crate::context::PolicyContext;
use crate::dispatcher::PolicyDispatcher;
use crate::executors::{DropChunksExecutor, MaterializeExecutor, PolicyExecutor, ReorderExecutor};
use crate::fast_restart::FastRestart;
use crate::license::LicenseGate;
use crate::outcome::PolicyOutcome;
use crate::schedule::ScheduleService;

/// Storage primitives the executors delegate the actual work to.
#[derive(Clone)]
pub struct PolicyPrimitives {
    pub reorder: Arc<dyn ReorderChunk>,
    pub drop_chunks: Arc<dyn DropChunks>,
    pub integer_now: Arc<dyn IntegerNow>,
    pub materializer: Arc<dyn Materializer>,
}

/// The dispatcher and schedule API wired over one catalog session.
pub struct PolicyEngine {
    dispatcher: PolicyDispatcher,
    schedule: ScheduleService,
}

impl PolicyEngine {
    pub fn new(
        ctx: PolicyContext,
        primitives: PolicyPrimitives,
        license: Arc<dyn LicenseProvider>,
        config: &ChronoConfig,
    ) -> Self {
        let gate = Arc::new(LicenseGate::new(license, ctx.clock.clone(), &config.license));
        let policy_config = &config.policy;

        let executors: Vec<Arc<dyn PolicyExecutor>> = vec![
            Arc::new(ReorderExecutor::new(
                ctx.clone(),
                primitives.reorder,
                policy_config.reorder.fast_continue,
            )),
            Arc::new(DropChunksExecutor::new(
                ctx.clone(),
                primitives.drop_chunks,
                primitives.integer_now,
            )),
            Arc::new(MaterializeExecutor::new(
                ctx.clone(),
                primitives.materializer,
                policy_config.materialize.verbose,
            )),
        ];

        let dispatcher = PolicyDispatcher::new(
            ctx.session.clone(),
            gate.clone(),
            FastRestart::new(ctx.job_stats.clone()),
            executors,
        );
        let schedule = ScheduleService::new(ctx.session, ctx.jobs, gate);

        Self {
            dispatcher,
            schedule,
        }
    }

    pub fn dispatcher(&self) -> &PolicyDispatcher {
        &self.dispatcher
    }

    pub fn schedule(&self) -> &ScheduleService {
        &self.schedule
    }

    /// See [`PolicyDispatcher::execute`].
    pub async fn execute(&self, job: &Job) -> CoreResult<PolicyOutcome> {
        self.dispatcher.execute(job).await
    }

    /// See [`PolicyDispatcher::run`].
    pub async fn run(&self, job: &Job) -> bool {
        self.dispatcher.run(job).await
    }

    /// See [`ScheduleService::alter_job_schedule`].
    pub async fn alter_job_schedule(
        &self,
        principal: &Principal,
        job_id: JobId,
        update: ScheduleUpdate,
        if_exists: bool,
    ) -> CoreResult<Option<AlteredSchedule>> {
        self.schedule
            .alter_job_schedule(principal, job_id, update, if_exists)
            .await
    }
}
