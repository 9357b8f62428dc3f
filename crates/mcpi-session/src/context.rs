//! Collaborators shared by every connection of one manager.

use mcpi_core::{
    ClientInfo, InspectorEventEmitter, Root, ShapeValidator, TransportConnector,
};
use std::sync::Arc;

use crate::history::RequestHistory;
use crate::notifications::NotificationLog;
use crate::sampling::SamplingQueue;

pub(crate) struct SessionContext {
    pub(crate) connector: Arc<dyn TransportConnector>,
    pub(crate) validator: Arc<dyn ShapeValidator>,
    pub(crate) emitter: Arc<dyn InspectorEventEmitter>,
    pub(crate) client_info: ClientInfo,
    pub(crate) roots: Vec<Root>,
    pub(crate) sampling: Arc<SamplingQueue>,
    pub(crate) notifications: Arc<NotificationLog>,
    pub(crate) history: Arc<RequestHistory>,
}
