use std::sync::Arc;

use reqwest::{
    header::LOCATION,
    multipart::{Form, Part},
    StatusCode,
};
use serde_json::{json, Value};

use newsroom::{authentication::get_jwt_token, db_helpers};

mod support;

use support::{spawn_app, spawn_app_with, TestApp};

const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

fn article_form(title: &str, perex: &str, body: &str, tags: &[&str]) -> Form {
    let mut form = Form::new()
        .text("form[title]", title.to_string())
        .text("form[perex]", perex.to_string())
        .text("form[body]", body.to_string());
    for tag in tags {
        form = form.text("form[tags][]", tag.to_string());
    }
    form
}

async fn get_json(app: &TestApp, path: &str) -> (StatusCode, Value) {
    let response = app.client.get(app.url(path)).send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

fn field<'a>(form: &'a Value, name: &str) -> &'a Value {
    form["fields"]
        .as_array()
        .unwrap()
        .iter()
        .find(|field| field["name"] == name)
        .unwrap_or_else(|| panic!("form has no field {name}: {form}"))
}

fn slugs(list: &Value) -> Vec<&str> {
    list["articles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|article| article["slug"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn health_check_and_unknown_routes() {
    let app = spawn_app(None).await;

    let response = app.client.get(app.url("/check_health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "alive");

    let response = app.client.get(app.url("/nowhere")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_shows_every_article_in_insertion_order_with_a_search_form() {
    let app = spawn_app(None).await;
    let (alice, _) = support::user(&app.state, "alice").await;
    for slug in ["one", "two", "three"] {
        support::article(&app.state, &alice, slug, vec![]).await;
    }

    let (status, list) = get_json(&app, "/article/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slugs(&list), ["one", "two", "three"]);
    assert_eq!(list["articlesCount"], 3);
    assert_eq!(list["articles"][0]["author"], "alice");

    let search = &list["searchForm"];
    assert_eq!(search["method"], "GET");
    assert_eq!(search["action"], "/article/");
    assert_eq!(field(search, "form[query]")["widget"], "text");
}

#[tokio::test]
async fn tag_search_returns_only_articles_with_that_tag() {
    let app = spawn_app(None).await;
    let (alice, _) = support::user(&app.state, "alice").await;
    let tutorial = support::tag(&app.state, "tutorial").await;
    let news = support::tag(&app.state, "news").await;
    support::article(&app.state, &alice, "a", vec![tutorial.clone()]).await;
    support::article(&app.state, &alice, "b", vec![news]).await;
    support::article(&app.state, &alice, "c", vec![tutorial]).await;

    let response = app
        .client
        .get(app.url("/article/"))
        .query(&[("form[query]", "tutorial")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let list: Value = response.json().await.unwrap();
    assert_eq!(slugs(&list), ["a", "c"]);
    assert_eq!(field(&list["searchForm"], "form[query]")["value"], "tutorial");

    let response = app
        .client
        .get(app.url("/article/"))
        .query(&[("form[query]", "nonexistent")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let list: Value = response.json().await.unwrap();
    assert!(slugs(&list).is_empty());
}

#[tokio::test]
async fn authoring_requires_a_signed_in_user() {
    let app = spawn_app(None).await;
    support::tag(&app.state, "news").await;

    let response = app.client.get(app.url("/article/new")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .post(app.url("/article/new"))
        .multipart(article_form("Hello World", "p", "b", &["1"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .get(app.url("/article/new"))
        .header("Authorization", "Token not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert!(db_helpers::list_all_articles(&app.state.pool)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn token_for_a_missing_user_is_rejected() {
    let app = spawn_app(None).await;
    let (alice, _) = support::user(&app.state, "alice").await;
    let article = support::article(&app.state, &alice, "discussed", vec![]).await;
    let ghost = get_jwt_token(&app.state.config.jwt_secret, 999).unwrap();

    let response = app
        .client
        .post(app.url("/article/discussed"))
        .header("Authorization", format!("Token {ghost}"))
        .form(&[("form[body]", "hi")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .post(app.url("/article/new"))
        .header("Authorization", format!("Token {ghost}"))
        .multipart(article_form("Ghost Writer", "p", "b", &[]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let articles = db_helpers::list_all_articles(&app.state.pool).await.unwrap();
    assert_eq!(articles.len(), 1);
    assert!(db_helpers::get_comments_for_article_in_db(&app.state.pool, article.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn submission_over_the_upload_limit_is_too_large() {
    let app = spawn_app_with(None, |config| config.upload_limit_bytes = 1024).await;
    let (_, token) = support::signed_in(&app.state, "alice").await;

    let image = Part::bytes(vec![0u8; 4096]).file_name("huge.bin");
    let form = article_form("Too Big", "p", "b", &[]).part("form[introduction_image]", image);
    let response = app
        .client
        .post(app.url("/article/new"))
        .header("Authorization", format!("Token {token}"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    assert!(db_helpers::list_all_articles(&app.state.pool)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn new_article_form_lists_every_tag() {
    let app = spawn_app(None).await;
    let (_, token) = support::signed_in(&app.state, "alice").await;
    for name in ["news", "rust", "tutorial"] {
        support::tag(&app.state, name).await;
    }

    let response = app
        .client
        .get(app.url("/article/new"))
        .header("Authorization", format!("Token {token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let view: Value = response.json().await.unwrap();
    let form = &view["form"];
    assert_eq!(form["method"], "POST");
    assert_eq!(form["action"], "/article/new");

    let tags = field(form, "form[tags][]");
    assert_eq!(tags["multiple"], true);
    let labels: Vec<_> = tags["choices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|choice| choice["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, ["news", "rust", "tutorial"]);
    assert_eq!(field(form, "form[introduction_image]")["widget"], "file");
    assert_eq!(field(form, "form[save]")["label"], "Publish");
}

#[tokio::test]
async fn publishing_an_article_redirects_to_the_list() {
    let app = spawn_app(None).await;
    let (_, token) = support::signed_in(&app.state, "alice").await;
    let mut ids = Vec::new();
    for name in ["news", "rust", "tutorial"] {
        ids.push(support::tag(&app.state, name).await.id);
    }
    assert_eq!(ids, [1, 2, 3]);

    let response = app
        .client
        .post(app.url("/article/new"))
        .header("Authorization", format!("Token {token}"))
        .multipart(article_form("Hello World", "Short intro", "Long body", &["3", "42"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/article/");

    let (status, show) = get_json(&app, "/article/hello-world").await;
    assert_eq!(status, StatusCode::OK);
    let article = &show["article"];
    assert_eq!(article["title"], "Hello World");
    assert_eq!(article["perex"], "Short intro");
    assert_eq!(article["body"], "Long body");
    assert_eq!(article["author"], "alice");
    assert_eq!(article["tags"], json!(["tutorial"]));
    assert_eq!(article["introductionImage"], Value::Null);
    assert_eq!(article["createdAt"], article["updatedAt"]);
    assert!(show["comments"].as_array().unwrap().is_empty());

    let response = app
        .client
        .get(app.url("/article/"))
        .query(&[("form[query]", "tutorial")])
        .send()
        .await
        .unwrap();
    let list: Value = response.json().await.unwrap();
    assert_eq!(slugs(&list), ["hello-world"]);
}

#[tokio::test]
async fn invalid_submission_is_redisplayed_with_errors() {
    let app = spawn_app(None).await;
    let (_, token) = support::signed_in(&app.state, "alice").await;
    support::tag(&app.state, "news").await;

    let response = app
        .client
        .post(app.url("/article/new"))
        .header("Authorization", format!("Token {token}"))
        .multipart(article_form("", "kept perex", "", &["1"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let view: Value = response.json().await.unwrap();
    let form = &view["form"];
    assert!(!field(form, "form[title]")["errors"].as_array().unwrap().is_empty());
    assert!(!field(form, "form[body]")["errors"].as_array().unwrap().is_empty());
    assert_eq!(field(form, "form[perex]")["value"], "kept perex");
    assert_eq!(field(form, "form[tags][]")["choices"][0]["selected"], true);

    assert!(db_helpers::list_all_articles(&app.state.pool)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn introduction_image_is_stored_and_served() {
    let app = spawn_app(None).await;
    let (_, token) = support::signed_in(&app.state, "alice").await;

    let image = Part::bytes(PNG.to_vec())
        .file_name("My Cat.png")
        .mime_str("image/png")
        .unwrap();
    let form = article_form("Cat Pictures", "p", "b", &[]).part("form[introduction_image]", image);
    let response = app
        .client
        .post(app.url("/article/new"))
        .header("Authorization", format!("Token {token}"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let (_, show) = get_json(&app, "/article/cat-pictures").await;
    let path = show["article"]["introductionImage"].as_str().unwrap().to_string();
    assert!(path.starts_with("images/my-cat-"), "{path}");
    assert!(path.ends_with(".png"), "{path}");

    let on_disk = app.state.workflow.uploader().resolve(&path);
    assert_eq!(tokio::fs::read(&on_disk).await.unwrap(), PNG);

    let response = app.client.get(app.url(&format!("/{path}"))).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.bytes().await.unwrap().as_ref(), PNG);
}

#[tokio::test]
async fn comments_are_posted_in_place() {
    let app = spawn_app(None).await;
    let (alice, token) = support::signed_in(&app.state, "alice").await;
    support::article(&app.state, &alice, "discussed", vec![]).await;

    let response = app
        .client
        .post(app.url("/article/discussed"))
        .form(&[("form[body]", "first!")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let show: Value = response.json().await.unwrap();
    assert_eq!(show["article"]["slug"], "discussed");
    let comment = &show["comments"][0];
    assert_eq!(comment["body"], "first!");
    assert_eq!(comment["author"], Value::Null);
    assert_eq!(comment["createdOn"], comment["updatedOn"]);

    let response = app
        .client
        .post(app.url("/article/discussed"))
        .header("Authorization", format!("Token {token}"))
        .form(&[("form[body]", "thanks")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let show: Value = response.json().await.unwrap();
    assert_eq!(show["comments"].as_array().unwrap().len(), 2);
    assert_eq!(show["comments"][1]["author"], "alice");

    let response = app
        .client
        .post(app.url("/article/discussed"))
        .form(&[("form[body]", "   ")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let show: Value = response.json().await.unwrap();
    assert_eq!(show["comments"].as_array().unwrap().len(), 2);
    assert!(!field(&show["commentForm"], "form[body]")["errors"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unknown_article_is_not_found() {
    let app = spawn_app(None).await;

    let (status, _) = get_json(&app, "/article/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = app
        .client
        .post(app.url("/article/missing"))
        .form(&[("form[body]", "hello?")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    for path in ["/article/999", "/article/not-a-number"] {
        let response = app
            .client
            .delete(app.url(path))
            .form(&[("_token", "whatever")])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
    }
}

#[tokio::test]
async fn delete_uses_the_token_from_the_delete_form() {
    let app = spawn_app(None).await;
    let (alice, _) = support::user(&app.state, "alice").await;
    let article = support::article(&app.state, &alice, "doomed", vec![]).await;

    let (_, show) = get_json(&app, "/article/doomed").await;
    let delete_form = &show["deleteForm"];
    assert_eq!(delete_form["method"], "DELETE");
    let action = delete_form["action"].as_str().unwrap().to_string();
    assert_eq!(action, format!("/article/{}", article.id));
    let token = field(delete_form, "_token")["value"].as_str().unwrap().to_string();

    let response = app
        .client
        .delete(app.url(&action))
        .form(&[("_token", "forged")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let (status, _) = get_json(&app, "/article/doomed").await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .client
        .delete(app.url(&action))
        .form(&[("_token", token.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/article/");

    let (status, _) = get_json(&app, "/article/doomed").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_with_a_known_token_scheme() {
    let app = spawn_app(Some(Arc::new(support::PlainCsrfTokens))).await;
    let (alice, _) = support::user(&app.state, "alice").await;
    for slug in ["a", "b", "c", "d", "e"] {
        support::article(&app.state, &alice, slug, vec![]).await;
    }

    let response = app
        .client
        .delete(app.url("/article/5"))
        .form(&[("_token", "wrong")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(db_helpers::list_all_articles(&app.state.pool).await.unwrap().len(), 5);

    let response = app
        .client
        .delete(app.url("/article/5"))
        .form(&[("_token", "delete5")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let remaining = db_helpers::list_all_articles(&app.state.pool).await.unwrap();
    let remaining: Vec<_> = remaining.iter().map(|article| article.slug.as_str()).collect();
    assert_eq!(remaining, ["a", "b", "c", "d"]);
}

#[tokio::test]
async fn register_then_login() {
    let app = spawn_app(None).await;

    let response = app
        .client
        .post(app.url("/users"))
        .json(&json!({"user": {"username": "bob", "email": "bob@example.com", "password": "hunter22"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let registered: Value = response.json().await.unwrap();
    assert_eq!(registered["user"]["username"], "bob");

    let response = app
        .client
        .post(app.url("/users"))
        .json(&json!({"user": {"username": "bob", "email": "bob@example.com", "password": "again"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .client
        .post(app.url("/users/login"))
        .json(&json!({"user": {"email": "bob@example.com", "password": "wrong"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .client
        .post(app.url("/users/login"))
        .json(&json!({"user": {"email": "bob@example.com", "password": "hunter22"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let logged_in: Value = response.json().await.unwrap();
    let token = logged_in["user"]["token"].as_str().unwrap();

    let response = app
        .client
        .get(app.url("/article/new"))
        .header("Authorization", format!("Token {token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
