// Mock agent transport shared by the wrapper tests

use async_trait::async_trait;
use mockall::mock;
use nimbus_core::domain::Value;
use nimbus_core::port::{RpcError, RpcTransport};
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Transport {}

    #[async_trait]
    impl RpcTransport for Transport {
        async fn call(
            &self,
            method: &str,
            params: Vec<Value>,
            timeout: Duration,
        ) -> Result<Value, RpcError>;
    }
}

/// Transport expecting exactly one call of `method` with `params`
pub(crate) fn expect_call(
    method: &'static str,
    params: Vec<Value>,
    reply: Value,
) -> Arc<MockTransport> {
    let mut mock = MockTransport::new();
    mock.expect_call()
        .withf(move |m: &str, p: &Vec<Value>, _timeout: &Duration| m == method && *p == params)
        .times(1)
        .returning(move |_, _, _| Ok(reply.clone()));
    Arc::new(mock)
}

/// Connection over [`expect_call`]
pub(crate) fn connection(method: &'static str, params: Vec<Value>, reply: Value) -> crate::Connection {
    crate::Connection::with_transport(expect_call(method, params, reply), "ovm-test", 8899)
}
