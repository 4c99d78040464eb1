//! OpenAPI schema aggregation for the monitor API.
use crate::api::{
    monitors, system,
    types::{ErrorResponse, HealthStatus, MonitorDocument},
};
use crate::model::{
    Action, IndexMonitorResponse, Monitor, MonitorInput, ResponseStatus, SearchInput, Throttle,
    ThrottleUnit, Trigger,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "monitors",
        version = "v1",
        description = "Monitor admission and indexing HTTP API"
    ),
    paths(
        system::system_health,
        monitors::create_monitor,
        monitors::update_monitor,
        monitors::get_monitor
    ),
    components(schemas(
        HealthStatus,
        ErrorResponse,
        Monitor,
        MonitorInput,
        SearchInput,
        Trigger,
        Action,
        Throttle,
        ThrottleUnit,
        IndexMonitorResponse,
        ResponseStatus,
        MonitorDocument
    )),
    tags(
        (name = "system", description = "Health endpoints"),
        (name = "monitors", description = "Monitor admission")
    )
)]
pub struct ApiDoc;
