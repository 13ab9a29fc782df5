//! Query Cursor Engine — Start→Continue pagination over signed queries.
//!
//! [`QueryClient::start`] is lazy: nothing is sent until the first
//! batch is pulled. Each pull is one signed round trip; the sequence
//! ends when the server returns no continuation cursor. A drained or
//! failed cursor stays ended — cursors are not restartable, and a
//! consumed [`ForwardCursor`] is never sent twice.

use std::sync::Arc;

use async_stream::try_stream;
use futures::Stream;
use serde_json::Value;

use ledgerrpc_core::error::{ProtocolError, QueryError};
use ledgerrpc_core::signer::Signer;
use ledgerrpc_core::transport::{Endpoint, Transport};
use ledgerrpc_core::wire::{
    ForwardCursor, Query, QueryOutput, QueryParams, QueryRequest, QueryResponse,
    SignedQueryRequest, SingularQuery,
};

/// Issues signed queries against one authority.
#[derive(Clone)]
pub struct QueryClient {
    transport: Arc<dyn Transport>,
    signer: Arc<dyn Signer>,
}

impl QueryClient {
    pub fn new(transport: Arc<dyn Transport>, signer: Arc<dyn Signer>) -> Self {
        Self { transport, signer }
    }

    /// Open a cursor over an iterable query. Lazy — the `Start` round
    /// trip happens on the first [`QueryCursor::next_batch`] call.
    pub fn start(&self, query: Query, params: QueryParams) -> QueryCursor {
        QueryCursor {
            transport: Arc::clone(&self.transport),
            signer: Arc::clone(&self.signer),
            next: Some(QueryRequest::Start { query, params }),
        }
    }

    /// Execute a singular query. A paginated ("iterable") answer here
    /// is a protocol violation.
    pub async fn singular(&self, query: SingularQuery) -> Result<Value, QueryError> {
        let response = round_trip(
            &*self.transport,
            &*self.signer,
            QueryRequest::Singular(query),
        )
        .await?;
        match response {
            QueryResponse::Singular { value } => Ok(value),
            other => Err(ProtocolError::UnexpectedResponse {
                expected: "singular",
                got: other.variant(),
            }
            .into()),
        }
    }
}

/// One signed query round trip.
async fn round_trip(
    transport: &dyn Transport,
    signer: &dyn Signer,
    request: QueryRequest,
) -> Result<QueryResponse, QueryError> {
    let signed = SignedQueryRequest::new(signer, request)?;
    let body = serde_json::to_value(&signed)
        .map_err(|e| QueryError::Protocol(ProtocolError::Undecodable(e.to_string())))?;

    let value = transport
        .post(Endpoint::Query, body)
        .await
        .map_err(QueryError::from_transport)?;

    serde_json::from_value(value).map_err(|e| ProtocolError::Undecodable(e.to_string()).into())
}

/// A live pagination cursor. Strictly sequential: at most one round
/// trip in flight per cursor instance.
pub struct QueryCursor {
    transport: Arc<dyn Transport>,
    signer: Arc<dyn Signer>,
    /// The next request to send — `Start` first, then `Continue`;
    /// `None` once drained or failed.
    next: Option<QueryRequest>,
}

impl QueryCursor {
    /// Pull the next batch. Returns `Ok(None)` once the server reports
    /// no continuation cursor. Any error ends the cursor; there is no
    /// partial-batch retry.
    pub async fn next_batch(&mut self) -> Result<Option<QueryOutput>, QueryError> {
        let Some(request) = self.next.take() else {
            return Ok(None);
        };

        let response = round_trip(&*self.transport, &*self.signer, request).await?;
        match response {
            QueryResponse::Iterable(output) => {
                self.next = output
                    .continue_cursor
                    .clone()
                    .map(QueryRequest::Continue);
                tracing::trace!(
                    batch_len = output.batch.len(),
                    remaining = output.remaining_items,
                    has_cursor = self.next.is_some(),
                    "query batch received"
                );
                Ok(Some(output))
            }
            other => Err(ProtocolError::UnexpectedResponse {
                expected: "iterable",
                got: other.variant(),
            }
            .into()),
        }
    }

    /// The cursor the next `Continue` would carry, if any.
    pub fn pending_cursor(&self) -> Option<&ForwardCursor> {
        match &self.next {
            Some(QueryRequest::Continue(cursor)) => Some(cursor),
            _ => None,
        }
    }

    /// Adapt the cursor into a `futures::Stream` of batches.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<QueryOutput, QueryError>> + Send {
        try_stream! {
            while let Some(batch) = self.next_batch().await? {
                yield batch;
            }
        }
    }

    /// Drain the whole sequence and flatten the batches in arrival
    /// order. Does not release the server-side cursor early — there is
    /// nothing left to release once drained.
    pub async fn collect_all(mut self) -> Result<Vec<Value>, QueryError> {
        let mut items = Vec::new();
        while let Some(output) = self.next_batch().await? {
            items.extend(output.batch);
        }
        Ok(items)
    }

    /// Expect exactly one item across the whole sequence.
    ///
    /// Fails fast with a cardinality error as soon as a second item is
    /// seen; an abandoned remainder is reclaimed by the server's idle
    /// timeout.
    pub async fn expect_exactly_one(mut self) -> Result<Value, QueryError> {
        let mut first = None;
        while let Some(output) = self.next_batch().await? {
            for item in output.batch {
                if first.is_some() {
                    return Err(QueryError::Cardinality {
                        expected: "exactly one",
                        got: 2,
                    });
                }
                first = Some(item);
            }
        }
        first.ok_or(QueryError::Cardinality {
            expected: "exactly one",
            got: 0,
        })
    }

    /// Expect zero or one items across the whole sequence.
    pub async fn expect_zero_or_one(mut self) -> Result<Option<Value>, QueryError> {
        let mut first = None;
        while let Some(output) = self.next_batch().await? {
            for item in output.batch {
                if first.is_some() {
                    return Err(QueryError::Cardinality {
                        expected: "zero or one",
                        got: 2,
                    });
                }
                first = Some(item);
            }
        }
        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use ledgerrpc_core::error::{ServiceError, TransportError};
    use ledgerrpc_core::signer::{self, Ed25519Signer};

    /// Scripted transport: pops one canned response per POST and
    /// records every request body it saw.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<Value, TransportError>>>,
        requests: Mutex<Vec<Value>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<Value, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn recorded(&self) -> Vec<Value> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post(&self, endpoint: Endpoint, body: Value) -> Result<Value, TransportError> {
            assert_eq!(endpoint, Endpoint::Query);
            self.requests.lock().unwrap().push(body);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected extra round trip")
        }

        async fn get(&self, _endpoint: Endpoint) -> Result<Value, TransportError> {
            unreachable!("queries never GET")
        }

        fn url(&self) -> &str {
            "mock://ledger"
        }
    }

    fn iterable(batch: Vec<Value>, cursor: Option<(&str, u64)>) -> Result<Value, TransportError> {
        Ok(json!({
            "kind": "iterable",
            "batch": batch,
            "remaining_items": 0,
            "continue_cursor": cursor.map(|(id, pos)| json!({
                "query_id": id,
                "position": pos,
            })),
        }))
    }

    fn client(transport: Arc<ScriptedTransport>) -> QueryClient {
        QueryClient::new(transport, Arc::new(Ed25519Signer::from_seed([1u8; 32])))
    }

    fn accounts_cursor(client: &QueryClient) -> QueryCursor {
        client.start(Query::ListAccounts { domain: None }, QueryParams::default())
    }

    #[tokio::test]
    async fn collect_all_concatenates_batches_with_one_round_trip_each() {
        let transport = ScriptedTransport::new(vec![
            iterable(vec![json!("a"), json!("b")], Some(("q1", 2))),
            iterable(vec![json!("c")], Some(("q1", 3))),
            iterable(vec![json!("d"), json!("e")], None),
        ]);
        let items = accounts_cursor(&client(Arc::clone(&transport)))
            .collect_all()
            .await
            .unwrap();

        assert_eq!(items, vec![json!("a"), json!("b"), json!("c"), json!("d"), json!("e")]);

        // Exactly N round trips: 1 Start + (N-1) Continue, in order.
        let requests = transport.recorded();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0]["request"]["kind"], "start");
        assert_eq!(requests[1]["request"]["kind"], "continue");
        assert_eq!(requests[1]["request"]["query_id"], "q1");
        assert_eq!(requests[1]["request"]["position"], 2);
        assert_eq!(requests[2]["request"]["kind"], "continue");
        assert_eq!(requests[2]["request"]["position"], 3);
    }

    #[tokio::test]
    async fn every_round_trip_is_independently_signed() {
        let transport = ScriptedTransport::new(vec![
            iterable(vec![json!(1)], Some(("q9", 1))),
            iterable(vec![json!(2)], None),
        ]);
        accounts_cursor(&client(Arc::clone(&transport)))
            .collect_all()
            .await
            .unwrap();

        for body in transport.recorded() {
            let signed: SignedQueryRequest = serde_json::from_value(body).unwrap();
            let bytes = signed.signed_bytes().unwrap();
            signer::verify(&signed.authority, &bytes, &signed.signature).unwrap();
        }
    }

    #[tokio::test]
    async fn pending_cursor_tracks_the_next_continue_token() {
        let transport = ScriptedTransport::new(vec![
            iterable(vec![json!(1)], Some(("q7", 4))),
            iterable(vec![json!(2)], None),
        ]);
        let mut cursor = accounts_cursor(&client(transport));

        // Nothing pending before the Start round trip.
        assert!(cursor.pending_cursor().is_none());

        cursor.next_batch().await.unwrap();
        let pending = cursor.pending_cursor().expect("mid-sequence cursor");
        assert_eq!(pending.query_id, "q7");
        assert_eq!(pending.position, 4);

        cursor.next_batch().await.unwrap();
        assert!(cursor.pending_cursor().is_none());
    }

    #[tokio::test]
    async fn expect_exactly_one_succeeds_on_one() {
        let transport = ScriptedTransport::new(vec![iterable(vec![json!("only")], None)]);
        let item = accounts_cursor(&client(transport))
            .expect_exactly_one()
            .await
            .unwrap();
        assert_eq!(item, json!("only"));
    }

    #[tokio::test]
    async fn expect_exactly_one_fails_on_zero_and_two() {
        let transport = ScriptedTransport::new(vec![iterable(vec![], None)]);
        let err = accounts_cursor(&client(transport))
            .expect_exactly_one()
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Cardinality { got: 0, .. }));

        let transport = ScriptedTransport::new(vec![iterable(vec![json!(1), json!(2)], None)]);
        let err = accounts_cursor(&client(transport))
            .expect_exactly_one()
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Cardinality { got: 2, .. }));
    }

    #[tokio::test]
    async fn expect_zero_or_one_permits_both() {
        let transport = ScriptedTransport::new(vec![iterable(vec![], None)]);
        let none = accounts_cursor(&client(transport))
            .expect_zero_or_one()
            .await
            .unwrap();
        assert!(none.is_none());

        let transport = ScriptedTransport::new(vec![iterable(vec![json!("x")], None)]);
        let one = accounts_cursor(&client(transport))
            .expect_zero_or_one()
            .await
            .unwrap();
        assert_eq!(one, Some(json!("x")));
    }

    #[tokio::test]
    async fn singular_response_mid_pagination_is_a_protocol_violation() {
        let transport = ScriptedTransport::new(vec![Ok(json!({
            "kind": "singular",
            "value": 42,
        }))]);
        let err = accounts_cursor(&client(transport))
            .next_batch()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::Protocol(ProtocolError::UnexpectedResponse {
                expected: "iterable",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn singular_asserts_variant() {
        let transport = ScriptedTransport::new(vec![Ok(json!({
            "kind": "singular",
            "value": 1234,
        }))]);
        let value = client(transport)
            .singular(SingularQuery::ChainHeight)
            .await
            .unwrap();
        assert_eq!(value, json!(1234));
    }

    #[tokio::test]
    async fn service_error_aborts_the_sequence() {
        let transport = ScriptedTransport::new(vec![
            iterable(vec![json!("a")], Some(("q1", 1))),
            Err(TransportError::Service(ServiceError {
                code: 4001,
                message: "cursor expired".into(),
            })),
        ]);
        let mut cursor = accounts_cursor(&client(transport));

        assert!(cursor.next_batch().await.unwrap().is_some());
        let err = cursor.next_batch().await.unwrap_err();
        assert!(err.is_service_error());

        // The cursor stays ended; no further round trips are attempted.
        assert!(cursor.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stream_adapter_yields_batches_lazily() {
        use tokio_stream::StreamExt;

        let transport = ScriptedTransport::new(vec![
            iterable(vec![json!(1)], Some(("q1", 1))),
            iterable(vec![json!(2)], None),
        ]);
        let stream = accounts_cursor(&client(Arc::clone(&transport))).into_stream();
        tokio::pin!(stream);

        // Lazy: nothing sent before the first poll.
        assert!(transport.recorded().is_empty());

        let mut heights = Vec::new();
        while let Some(batch) = stream.next().await {
            heights.extend(batch.unwrap().batch);
        }
        assert_eq!(heights, vec![json!(1), json!(2)]);
    }
}
