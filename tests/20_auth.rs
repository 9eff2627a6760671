mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::{expect_error, expired_token_for, token_for, ORCID_JOSIAH, ORCID_OTHER};

#[tokio::test]
async fn writes_require_a_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/api/researchers"))
        .json(&json!({ "family_name": "Carberry" }))
        .send()
        .await?;
    let body = expect_error(res, StatusCode::UNAUTHORIZED, "UNAUTHORIZED").await?;
    assert_eq!(body["error"], "Missing Authorization header");

    let res = client
        .delete(server.url(&format!("/api/researchers/{}", ORCID_JOSIAH)))
        .header("Authorization", "Basic dXNlcjpwYXNz")
        .send()
        .await?;
    expect_error(res, StatusCode::UNAUTHORIZED, "UNAUTHORIZED").await?;
    Ok(())
}

#[tokio::test]
async fn forged_and_expired_tokens_are_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let url = server.url(&format!("/api/researchers/{}/sync", ORCID_JOSIAH));

    let res = client.post(&url).bearer_auth("not.a.jwt").send().await?;
    expect_error(res, StatusCode::UNAUTHORIZED, "UNAUTHORIZED").await?;

    let res = client.post(&url).bearer_auth(expired_token_for(ORCID_JOSIAH)).send().await?;
    expect_error(res, StatusCode::UNAUTHORIZED, "UNAUTHORIZED").await?;
    Ok(())
}

#[tokio::test]
async fn researchers_cannot_modify_someone_else() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let token = token_for(ORCID_JOSIAH);

    let res = client
        .put(server.url(&format!("/api/researchers/{}", ORCID_OTHER)))
        .bearer_auth(&token)
        .json(&json!({ "family_name": "Mallory" }))
        .send()
        .await?;
    expect_error(res, StatusCode::FORBIDDEN, "FORBIDDEN").await?;

    let res = client
        .post(server.url(&format!("/api/researchers/{}/publications", ORCID_OTHER)))
        .bearer_auth(&token)
        .json(&json!({ "title": "Not mine" }))
        .send()
        .await?;
    expect_error(res, StatusCode::FORBIDDEN, "FORBIDDEN").await?;

    let res = client
        .post(server.url(&format!("/api/researchers/{}/sync", ORCID_OTHER)))
        .bearer_auth(&token)
        .send()
        .await?;
    expect_error(res, StatusCode::FORBIDDEN, "FORBIDDEN").await?;
    Ok(())
}

#[tokio::test]
async fn callback_requires_code_and_redirect() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/auth/orcid/callback"))
        .json(&json!({ "code": "  ", "redirect_uri": "http://localhost:5173/callback" }))
        .send()
        .await?;
    let body = expect_error(res, StatusCode::BAD_REQUEST, "BAD_REQUEST").await?;
    assert_eq!(body["error"], "Authorization code is required");

    let res = client
        .post(server.url("/auth/orcid/callback"))
        .json(&json!({ "code": "abc123" }))
        .send()
        .await?;
    expect_error(res, StatusCode::BAD_REQUEST, "BAD_REQUEST").await?;
    Ok(())
}
