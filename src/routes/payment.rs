//! /v1/payment routes

use super::{ok, HttpResponse};
use crate::auth::AuthMode;
use crate::server::codec::ApiRequest;
use crate::server::AppState;
use crate::services::payment::{self, GetCodeInput, PayByCodeInput};
use crate::types::Result;

pub async fn get_code(state: &AppState, req: &ApiRequest) -> Result<HttpResponse> {
    let ctx = req.ctx(AuthMode::Required)?;
    let input: GetCodeInput = req.query()?;
    let out = payment::get_code(&state.backends, &state.sealer, &ctx, &input).await?;
    Ok(ok(req, out))
}

/// Runs as a tracked job so a dropped connection cannot strand a reservation
pub async fn pay_by_code(state: &AppState, req: &ApiRequest) -> Result<HttpResponse> {
    let ctx = req.ctx(AuthMode::Required)?;
    let input: PayByCodeInput = req.body()?;
    let sub = payment::pay_by_code(
        &state.backends,
        &state.sealer,
        &state.jobs,
        &ctx,
        &input.code,
    )
    .await?;
    Ok(ok(req, sub))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Conf, SAMPLE};
    use crate::routes::dispatch;
    use crate::sealing::{KeyKind, SealKey, Sealer};
    use crate::services::writing::{SaleTarget, SubscriptionKind};
    use crate::testing::{Fakes, GROUP, USER};
    use crate::types::Id;
    use bytes::Bytes;
    use http_body_util::BodyExt;
    use hyper::{HeaderMap, Method, StatusCode};

    const CREATION: Id = Id::from_bytes([7; 12]);

    fn state(fakes: &Fakes) -> AppState {
        fakes.writing.put_sale_target(
            SubscriptionKind::Creation,
            SaleTarget {
                gid: GROUP,
                id: CREATION,
                title: "A creation".into(),
                language: "eng".into(),
                price: 100,
            },
        );
        fakes.wallet.set_balance(1000);
        AppState::new(
            Conf::from_toml(SAMPLE).unwrap(),
            fakes.backends(),
            Sealer::new(SealKey::generate(KeyKind::AesGcm, b"payment")),
        )
    }

    fn request(method: Method, path: &str, query: String, body: Bytes) -> ApiRequest {
        let mut headers = HeaderMap::new();
        headers.insert("x-auth-user", USER.to_string().parse().unwrap());
        ApiRequest {
            method,
            path: path.into(),
            query,
            headers,
            body,
        }
    }

    async fn json(res: HttpResponse) -> serde_json::Value {
        let body = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_code_then_pay() {
        let fakes = Fakes::default();
        let state = state(&fakes);

        let req = request(
            Method::GET,
            "/v1/payment/code",
            format!("kind=0&cid={}&gid={}", CREATION, GROUP),
            Bytes::new(),
        );
        let res = dispatch(&state, req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let offer = json(res).await;
        assert_eq!(offer["result"]["amount"], 100);
        let code = offer["result"]["code"].as_str().unwrap().to_string();

        let body = serde_json::json!({ "code": code }).to_string();
        let req = request(
            Method::POST,
            "/v1/payment/by_code",
            String::new(),
            Bytes::from(body),
        );
        let res = dispatch(&state, req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json(res).await["result"]["cid"], CREATION.to_string());
        assert_eq!(fakes.wallet.balance(), 900);
    }

    #[tokio::test]
    async fn test_garbage_code() {
        let fakes = Fakes::default();
        let state = state(&fakes);
        let req = request(
            Method::POST,
            "/v1/payment/by_code",
            String::new(),
            Bytes::from_static(br#"{"code":"not-a-code"}"#),
        );
        let err = dispatch(&state, req).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(fakes.wallet.balance(), 1000);
    }

    #[tokio::test]
    async fn test_requires_user() {
        let fakes = Fakes::default();
        let state = state(&fakes);
        let mut req = request(
            Method::GET,
            "/v1/payment/code",
            format!("kind=0&cid={}", CREATION),
            Bytes::new(),
        );
        req.headers.clear();
        let err = dispatch(&state, req).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
