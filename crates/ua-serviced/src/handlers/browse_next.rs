//! BrowseNext handler (§4.F "BrowseNext"): redeems continuation points
//! issued by `Browse` (or a previous `BrowseNext`) against the same
//! `ContinuationPointStore`.

use chrono::Utc;
use ua_core::StatusCode;
use ua_proto::{BrowseNextRequest, BrowseNextResponse, BrowseResult, ResponseHeader};

use super::browse::ContinuationPointStore;

pub fn handle_browse_next(
    continuation_point_store: &ContinuationPointStore,
    request: &BrowseNextRequest,
) -> BrowseNextResponse {
    let now = Utc::now();

    if request.continuation_points.is_empty() {
        return BrowseNextResponse {
            header: ResponseHeader::fault(&request.header, now, StatusCode::BadNoContinuationPoints),
            results: Vec::new(),
        };
    }

    let results = request
        .continuation_points
        .iter()
        .map(|continuation_point| {
            if request.release_continuation_points {
                continuation_point_store.release(continuation_point);
                return BrowseResult { status: StatusCode::Ok, continuation_point: Vec::new(), references: Vec::new() };
            }
            match continuation_point_store.take(continuation_point) {
                Some(references) => BrowseResult { status: StatusCode::Ok, continuation_point: Vec::new(), references },
                None => BrowseResult {
                    status: StatusCode::BadContinuationPointInvalid,
                    continuation_point: Vec::new(),
                    references: Vec::new(),
                },
            }
        })
        .collect();

    BrowseNextResponse { header: ResponseHeader::ok(&request.header, now), results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ua_proto::RequestHeader;

    fn header() -> RequestHeader {
        RequestHeader::dummy(Utc::now())
    }

    #[test]
    fn empty_continuation_point_list_is_rejected() {
        let store = ContinuationPointStore::new();
        let request = BrowseNextRequest { header: header(), release_continuation_points: false, continuation_points: Vec::new() };
        let response = handle_browse_next(&store, &request);
        assert_eq!(response.header.service_result, StatusCode::BadNoContinuationPoints);
        assert!(response.results.is_empty());
    }

    #[test]
    fn unknown_continuation_point_is_reported_per_result() {
        let store = ContinuationPointStore::new();
        let request = BrowseNextRequest {
            header: header(),
            release_continuation_points: false,
            continuation_points: vec![vec![0, 0, 0, 1]],
        };
        let response = handle_browse_next(&store, &request);
        assert_eq!(response.results[0].status, StatusCode::BadContinuationPointInvalid);
    }

    #[test]
    fn redeeming_a_continuation_point_returns_its_stored_references_exactly_once() {
        let store = ContinuationPointStore::new();
        let token = store.store(vec![sample_reference()]);
        let request = BrowseNextRequest { header: header(), release_continuation_points: false, continuation_points: vec![token.clone()] };

        let first = handle_browse_next(&store, &request);
        assert_eq!(first.results[0].status, StatusCode::Ok);
        assert_eq!(first.results[0].references.len(), 1);

        let second = handle_browse_next(&store, &request);
        assert_eq!(second.results[0].status, StatusCode::BadContinuationPointInvalid);
    }

    #[test]
    fn releasing_a_continuation_point_frees_it_without_returning_references() {
        let store = ContinuationPointStore::new();
        let token = store.store(vec![sample_reference()]);
        let release_request =
            BrowseNextRequest { header: header(), release_continuation_points: true, continuation_points: vec![token.clone()] };
        let response = handle_browse_next(&store, &release_request);
        assert_eq!(response.results[0].status, StatusCode::Ok);
        assert!(response.results[0].references.is_empty());

        let redeem_request = BrowseNextRequest { header: header(), release_continuation_points: false, continuation_points: vec![token] };
        let redeemed = handle_browse_next(&store, &redeem_request);
        assert_eq!(redeemed.results[0].status, StatusCode::BadContinuationPointInvalid);
    }

    fn sample_reference() -> ua_proto::ReferenceDescription {
        ua_proto::ReferenceDescription {
            reference_type_id: ua_core::NodeId::numeric(0, 40),
            is_forward: true,
            target_node_id: ua_core::NodeId::numeric(1, 1).into(),
            browse_name: None,
            display_name: None,
            node_class: None,
            type_definition: None,
        }
    }
}
