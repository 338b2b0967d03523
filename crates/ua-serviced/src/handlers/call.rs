//! Call handler (§4.F "Call"): method invocation.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use ua_core::{NodeId, StatusCode, Variant};
use ua_proto::{CallMethodResult, CallRequest, CallResponse, ResponseHeader};

use crate::encode::CallResultBuilder;

pub const MAX_OPERATIONS_PER_MESSAGE: u32 = 1000;

/// A registered method callback: `(object_id, input_args, user_context) ->
/// (status, output_args)` (§4.F "Call").
pub type MethodCallback = dyn Fn(&NodeId, &[Variant]) -> (StatusCode, Vec<Variant>) + Send + Sync;

/// Maps method NodeIds to their callbacks, modelling the endpoint's
/// `MethodCallManager`. The `Mutex` around `exec_results` reproduces the
/// source's "a second concurrent Call while execResults is non-empty is a
/// programming error" guard (§4.F) as a runtime assertion, since the
/// single-threaded event dispatcher (§5) guarantees no two Call requests
/// ever overlap in practice.
pub struct MethodCallManager {
    methods: HashMap<NodeId, Box<MethodCallback>>,
    in_flight: Mutex<bool>,
}

impl MethodCallManager {
    pub fn new() -> Self {
        MethodCallManager { methods: HashMap::new(), in_flight: Mutex::new(false) }
    }

    pub fn register(&mut self, method_id: NodeId, callback: Box<MethodCallback>) {
        self.methods.insert(method_id, callback);
    }

    pub fn get_method(&self, method_id: &NodeId) -> Option<&MethodCallback> {
        self.methods.get(method_id).map(|b| b.as_ref())
    }
}

impl Default for MethodCallManager {
    fn default() -> Self {
        MethodCallManager::new()
    }
}

pub fn handle_call(manager: &MethodCallManager, request: &CallRequest) -> CallResponse {
    let now = Utc::now();
    if request.methods_to_call.is_empty() {
        return CallResponse {
            header: ResponseHeader::fault(&request.header, now, StatusCode::BadNothingToDo),
            results: Vec::new(),
        };
    }
    if request.methods_to_call.len() as u32 > MAX_OPERATIONS_PER_MESSAGE {
        return CallResponse {
            header: ResponseHeader::fault(&request.header, now, StatusCode::BadTooManyOperations),
            results: Vec::new(),
        };
    }

    let mut guard = manager.in_flight.lock();
    assert!(!*guard, "concurrent Call invocation while execResults is non-empty");
    *guard = true;

    let mut builder = CallResultBuilder::new(request.methods_to_call.len());
    for item in &request.methods_to_call {
        match manager.get_method(&item.method_id) {
            None => builder.push(CallMethodResult {
                status: StatusCode::BadNotImplemented,
                input_argument_results: Vec::new(),
                output_arguments: Vec::new(),
            }),
            Some(callback) => {
                let (status, mut outputs) = callback(&item.object_id, &item.input_arguments);
                let status = if outputs.len() as u64 > i32::MAX as u64 {
                    outputs.truncate(i32::MAX as usize);
                    StatusCode::BadQueryTooComplex
                } else {
                    status
                };
                builder.push(CallMethodResult { status, input_argument_results: Vec::new(), output_arguments: outputs });
            }
        }
    }

    *guard = false;
    drop(guard);

    builder.finalize(ResponseHeader::ok(&request.header, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ua_proto::{CallMethodRequest, RequestHeader};

    #[test]
    fn call_unknown_method_is_not_implemented() {
        let manager = MethodCallManager::new();
        let request = CallRequest {
            header: RequestHeader::dummy(Utc::now()),
            methods_to_call: vec![CallMethodRequest {
                object_id: NodeId::numeric(1, 1),
                method_id: NodeId::numeric(1, 2),
                input_arguments: Vec::new(),
            }],
        };
        let response = handle_call(&manager, &request);
        assert_eq!(response.results[0].status, StatusCode::BadNotImplemented);
    }

    #[test]
    fn call_registered_method_invokes_callback() {
        let mut manager = MethodCallManager::new();
        let method_id = NodeId::numeric(1, 5);
        manager.register(
            method_id.clone(),
            Box::new(|_obj, args| (StatusCode::Ok, vec![args.first().cloned().unwrap_or(Variant::Null)])),
        );
        let request = CallRequest {
            header: RequestHeader::dummy(Utc::now()),
            methods_to_call: vec![CallMethodRequest {
                object_id: NodeId::numeric(1, 1),
                method_id,
                input_arguments: vec![Variant::Scalar(ua_core::ScalarValue::Int32(5))],
            }],
        };
        let response = handle_call(&manager, &request);
        assert_eq!(response.results[0].status, StatusCode::Ok);
        assert_eq!(response.results[0].output_arguments, vec![Variant::Scalar(ua_core::ScalarValue::Int32(5))]);
    }

    #[test]
    fn empty_call_request_is_nothing_to_do() {
        let manager = MethodCallManager::new();
        let request = CallRequest { header: RequestHeader::dummy(Utc::now()), methods_to_call: Vec::new() };
        let response = handle_call(&manager, &request);
        assert_eq!(response.header.service_result, StatusCode::BadNothingToDo);
    }
}
