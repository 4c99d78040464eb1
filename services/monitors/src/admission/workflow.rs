use super::policy::{check_destinations, check_throttles};
use super::quota::check_capacity;
use super::readiness::{
    IndexReadiness, IndexState, Readiness, SCHEDULED_JOBS_INDEX, SCHEMA_VERSION,
};
use super::source::check_source_access;
use super::{AdmissionError, ErrorKind, bounded};
use crate::model::document::{monitor_from_source, monitor_to_source};
use crate::model::{
    IndexMonitorResponse, Monitor, MonitorRequest, ResponseStatus, WriteOperation,
};
use crate::settings::{LiveSettings, SettingsHandle};
use jobstore::{DocumentStore, PutRequest, ShardInfo};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Provisioning normally needs one pass, two when a concurrent creator wins.
const MAX_PROVISIONING_PASSES: u32 = 3;

/// Position of one admission attempt in the workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    ValidateSource,
    EnsureIndexReady,
    ValidatePolicy,
    CheckCapacity,
    FetchExisting,
    /// Monitor as it will be persisted, before schema stamping.
    Write(Box<Monitor>),
    Done(Box<IndexMonitorResponse>),
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::ValidateSource => "validate_source",
            Step::EnsureIndexReady => "ensure_index_ready",
            Step::ValidatePolicy => "validate_policy",
            Step::CheckCapacity => "check_capacity",
            Step::FetchExisting => "fetch_existing",
            Step::Write(_) => "write",
            Step::Done(_) => "done",
        }
    }
}

/// Per-request state carried between steps.
#[derive(Debug)]
pub struct AdmissionContext {
    pub request: MonitorRequest,
    /// Settings captured when the attempt started; every step reads this
    /// snapshot.
    pub settings: Arc<LiveSettings>,
    provisioning_passes: u32,
}

impl AdmissionContext {
    pub fn new(request: MonitorRequest, settings: Arc<LiveSettings>) -> Self {
        Self {
            request,
            settings,
            provisioning_passes: 0,
        }
    }

    /// Budget for read-side store calls.
    fn read_timeout(&self) -> Duration {
        self.request.timeout.unwrap_or(self.settings.request_timeout)
    }
}

#[derive(Clone)]
pub struct Admission {
    store: Arc<dyn DocumentStore>,
    settings: SettingsHandle,
    index_state: Arc<IndexState>,
    index: String,
}

impl Admission {
    pub fn new(store: Arc<dyn DocumentStore>, settings: SettingsHandle) -> Self {
        Self {
            store,
            settings,
            index_state: Arc::new(IndexState::default()),
            index: SCHEDULED_JOBS_INDEX.to_string(),
        }
    }

    pub fn index_state(&self) -> &IndexState {
        &self.index_state
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    /// Start an attempt against the current settings snapshot.
    pub fn begin(&self, request: MonitorRequest) -> AdmissionContext {
        AdmissionContext::new(request, self.settings.snapshot())
    }

    /// Run one request to its single terminal outcome.
    pub async fn admit(
        &self,
        request: MonitorRequest,
    ) -> Result<IndexMonitorResponse, AdmissionError> {
        let span = tracing::info_span!(
            "monitor.admission",
            operation = request.operation.name(),
            monitor_id = request.monitor_id().unwrap_or_default(),
        );
        let context = self.begin(request);
        let result = self.drive(context).instrument(span.clone()).await;

        let outcome = span.in_scope(|| match &result {
            Ok(response) => {
                tracing::info!(
                    id = %response.id,
                    seq_no = response.seq_no,
                    version = response.version,
                    "monitor indexed"
                );
                "admitted"
            }
            Err(err) => {
                match err.kind() {
                    ErrorKind::Internal => tracing::error!(error = %err, "admission failed"),
                    kind => {
                        tracing::warn!(kind = kind.as_str(), error = %err, "admission rejected")
                    }
                }
                err.kind().as_str()
            }
        });
        metrics::counter!("monitor_admissions_total", "outcome" => outcome).increment(1);
        result
    }

    async fn drive(
        &self,
        mut context: AdmissionContext,
    ) -> Result<IndexMonitorResponse, AdmissionError> {
        validate_request(&context)?;
        let mut step = Step::ValidateSource;
        loop {
            tracing::debug!(step = step.name(), "admission step");
            step = match self.advance(&mut context, step).await? {
                Step::Done(response) => return Ok(*response),
                next => next,
            };
        }
    }

    /// Execute `step` and return the one that follows it.
    pub async fn advance(
        &self,
        context: &mut AdmissionContext,
        step: Step,
    ) -> Result<Step, AdmissionError> {
        match step {
            Step::ValidateSource => {
                check_source_access(
                    self.store.as_ref(),
                    &context.request.monitor,
                    context.read_timeout(),
                )
                .await?;
                Ok(Step::EnsureIndexReady)
            }
            Step::EnsureIndexReady => {
                let readiness =
                    IndexReadiness::new(self.store.as_ref(), &self.index_state, &self.index);
                if context.provisioning_passes >= MAX_PROVISIONING_PASSES {
                    return Err(AdmissionError::Internal(format!(
                        "{} was not ready after {MAX_PROVISIONING_PASSES} provisioning attempts",
                        self.index
                    )));
                }
                match readiness.ensure_ready(context.settings.index_timeout).await? {
                    Readiness::Ready => Ok(Step::ValidatePolicy),
                    Readiness::Provisioned => {
                        context.provisioning_passes += 1;
                        Ok(Step::EnsureIndexReady)
                    }
                }
            }
            Step::ValidatePolicy => {
                check_destinations(
                    self.store.as_ref(),
                    &self.index,
                    &context.request.monitor,
                    &context.settings,
                    context.read_timeout(),
                )
                .await?;
                Ok(match context.request.operation {
                    WriteOperation::Create => Step::CheckCapacity,
                    WriteOperation::Update { .. } => Step::FetchExisting,
                })
            }
            Step::CheckCapacity => {
                check_capacity(
                    self.store.as_ref(),
                    &self.index,
                    context.settings.max_monitors,
                    context.read_timeout(),
                )
                .await?;
                Ok(Step::Write(Box::new(context.request.monitor.clone())))
            }
            Step::FetchExisting => self.fetch_existing(context).await,
            Step::Write(monitor) => {
                let response = self.write(context, *monitor).await?;
                Ok(Step::Done(Box::new(response)))
            }
            Step::Done(response) => Ok(Step::Done(response)),
        }
    }

    async fn fetch_existing(&self, context: &AdmissionContext) -> Result<Step, AdmissionError> {
        let Some(id) = context.request.monitor_id() else {
            return Err(AdmissionError::Validation(
                "Monitor id is required for an update".to_string(),
            ));
        };
        let document = bounded(
            context.read_timeout(),
            "monitor lookup",
            self.store.get(&self.index, id),
        )
        .await
        .map_err(|err| AdmissionError::store(format!("failed to fetch monitor {id}"), err))?
        .ok_or_else(|| AdmissionError::NotFound(format!("Monitor with {id} is not found")))?;

        let previous = monitor_from_source(&document.source).map_err(|err| {
            AdmissionError::Internal(format!("failed to parse stored monitor {id}: {err}"))
        })?;
        let mut monitor = context.request.monitor.clone();
        monitor.reconcile_enabled_time(&previous);
        Ok(Step::Write(Box::new(monitor)))
    }

    async fn write(
        &self,
        context: &AdmissionContext,
        mut monitor: Monitor,
    ) -> Result<IndexMonitorResponse, AdmissionError> {
        monitor.schema_version = SCHEMA_VERSION;
        let source = monitor_to_source(&monitor)
            .map_err(|err| AdmissionError::Internal(format!("failed to encode monitor: {err}")))?;

        let request = &context.request;
        let mut put = PutRequest::new(self.index.as_str(), source)
            .with_refresh(request.refresh)
            .with_precondition(request.revision.is_assigned().then_some(request.revision));
        if let Some(id) = request.monitor_id() {
            put = put.with_id(id);
        }

        let response = bounded(
            context.settings.index_timeout,
            "index monitor",
            self.store.put(put),
        )
        .await
        .map_err(|err| AdmissionError::store("failed to index monitor", err))?;

        if response.shards.failed > 0 {
            return Err(AdmissionError::PartialWrite(shard_failure_reasons(
                &response.shards,
            )));
        }
        Ok(IndexMonitorResponse {
            id: response.id,
            version: response.version,
            seq_no: response.seq_no,
            primary_term: response.primary_term,
            status: ResponseStatus::Created,
            monitor,
        })
    }
}

/// Checks that need no store call; they run before anything is provisioned.
fn validate_request(context: &AdmissionContext) -> Result<(), AdmissionError> {
    let request = &context.request;
    if let WriteOperation::Update { monitor_id } = &request.operation {
        if monitor_id.trim().is_empty() {
            return Err(AdmissionError::Validation(
                "Monitor id must not be empty".to_string(),
            ));
        }
    }
    if request.monitor.name.trim().is_empty() {
        return Err(AdmissionError::Validation(
            "Monitor name must not be empty".to_string(),
        ));
    }
    if request
        .monitor
        .search_inputs()
        .any(|input| input.indices.is_empty())
    {
        return Err(AdmissionError::Validation(
            "Search input must name at least one index".to_string(),
        ));
    }
    check_throttles(&request.monitor, context.settings.max_action_throttle)
}

fn shard_failure_reasons(shards: &ShardInfo) -> String {
    if shards.failures.is_empty() {
        return format!("{} of {} shards failed", shards.failed, shards.total);
    }
    shards
        .failures
        .iter()
        .map(|failure| failure.reason.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
