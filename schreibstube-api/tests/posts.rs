//! Creating, editing and commenting on posts.

mod common;

use axum::http::StatusCode;
use common::{Part, SMALL_GIF, TestApp};
use schreibstube_db::{PostFilter, Repository};
use serde_json::json;

#[tokio::test]
async fn anonymous_users_are_sent_to_login() {
    let app = TestApp::new();
    let author = app.create_user("RingoStarr").await;
    let post = app.create_post(&author, "Original", None).await;

    app.get("/create/", None)
        .await
        .assert_redirect("/auth/login/?next=%2Fcreate%2F");
    app.post_multipart("/create/", &[Part::Text("text", "Sneaky")], None)
        .await
        .assert_redirect("/auth/login/?next=%2Fcreate%2F");

    let edit = format!("/posts/{}/edit/", post.id);
    let login = format!("/auth/login/?next=%2Fposts%2F{}%2Fedit%2F", post.id);
    app.get(&edit, None).await.assert_redirect(&login);
    app.post_multipart(&edit, &[Part::Text("text", "Sneaky")], None)
        .await
        .assert_redirect(&login);

    assert_eq!(app.repository.count_posts(PostFilter::All).await.unwrap(), 1);
    let stored = app.repository.fetch_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.text.get(), "Original");
}

#[tokio::test]
async fn login_page_asks_for_a_token() {
    let app = TestApp::new();

    let response = app.get("/auth/login/?next=%2Fcreate%2F", None).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json(),
        json!({ "status": 401, "next": "/create/" })
    );
}

#[tokio::test]
async fn create_form_is_empty() {
    let app = TestApp::new();
    let author = app.create_user("RingoStarr").await;

    let response = app.get("/create/", Some(&author.access_token)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({
            "is_edit": false,
            "form": { "text": "", "group": null, "image": null },
            "errors": {},
        })
    );
}

#[tokio::test]
async fn created_post_redirects_to_profile() {
    let app = TestApp::new();
    let author = app.create_user("RingoStarr").await;
    let group = app.create_group("The Beatles", "beatles").await;

    app.post_multipart(
        "/create/",
        &[
            Part::Text("text", "Hello"),
            Part::Text("group", &group.id.to_string()),
        ],
        Some(&author.access_token),
    )
    .await
    .assert_redirect("/profile/RingoStarr/");

    let posts = app
        .repository
        .list_posts(PostFilter::Author(author.user.id), 10, 0)
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text.get(), "Hello");
    assert_eq!(posts[0].group.as_ref(), Some(&group));
    assert_eq!(posts[0].image, None);

    assert_eq!(app.get("/group/beatles/", None).await.post_texts(), ["Hello"]);
}

#[tokio::test]
async fn invalid_post_is_shown_again_with_errors() {
    let app = TestApp::new();
    let author = app.create_user("RingoStarr").await;

    let response = app
        .post_multipart(
            "/create/",
            &[Part::Text("text", "  "), Part::Text("group", "12345")],
            Some(&author.access_token),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({
            "is_edit": false,
            "form": { "text": "  ", "group": "12345", "image": null },
            "errors": {
                "group": ["Select a valid choice. That choice is not one of the available choices."],
                "text": ["This field is required."],
            },
        })
    );
    assert_eq!(app.repository.count_posts(PostFilter::All).await.unwrap(), 0);
}

#[tokio::test]
async fn uploaded_gif_is_stored_with_the_post() {
    let app = TestApp::new();
    let author = app.create_user("RingoStarr").await;

    app.post_multipart(
        "/create/",
        &[
            Part::Text("text", "With a picture"),
            Part::File("image", "small.gif", SMALL_GIF),
        ],
        Some(&author.access_token),
    )
    .await
    .assert_redirect("/profile/RingoStarr/");

    let posts = app.repository.list_posts(PostFilter::All, 10, 0).await.unwrap();
    let image = posts[0].image.clone().unwrap();
    assert!(image.starts_with("posts/"));
    assert!(image.ends_with(".gif"));
    assert_eq!(
        std::fs::read(app.media_root.path().join(&image)).unwrap(),
        SMALL_GIF
    );
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let app = TestApp::new();
    let author = app.create_user("RingoStarr").await;

    let response = app
        .post_multipart(
            "/create/",
            &[
                Part::Text("text", "With a picture"),
                Part::File("image", "small.gif", b"GIF? no"),
            ],
            Some(&author.access_token),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json()["errors"],
        json!({
            "image": ["Upload a valid image. The file you uploaded was either not an image or a corrupted image."],
        })
    );
    assert_eq!(app.repository.count_posts(PostFilter::All).await.unwrap(), 0);
}

#[tokio::test]
async fn corrupted_image_is_rejected() {
    let app = TestApp::new();
    let author = app.create_user("RingoStarr").await;

    let response = app
        .post_multipart(
            "/create/",
            &[
                Part::Text("text", "With a broken picture"),
                Part::File("image", "broken.png", b"\x89PNG\r\n\x1a\ngarbage-not-a-png"),
            ],
            Some(&author.access_token),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json()["errors"]["image"],
        json!(["Upload a valid image. The file you uploaded was either not an image or a corrupted image."])
    );
    assert_eq!(app.repository.count_posts(PostFilter::All).await.unwrap(), 0);
    assert!(!app.media_root.path().join("posts").exists());
}

#[tokio::test]
async fn author_edits_their_post() {
    let app = TestApp::new();
    let author = app.create_user("RingoStarr").await;
    let post = app.create_post(&author, "Original", None).await;
    let edit = format!("/posts/{}/edit/", post.id);

    let form = app.get(&edit, Some(&author.access_token)).await;
    assert_eq!(form.status, StatusCode::OK);
    assert_eq!(form.json()["is_edit"], true);
    assert_eq!(form.json()["form"]["text"], "Original");

    app.post_multipart(
        &edit,
        &[Part::Text("text", "Edited"), Part::Text("group", "")],
        Some(&author.access_token),
    )
    .await
    .assert_redirect(&format!("/posts/{}/", post.id));

    let stored = app.repository.fetch_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.text.get(), "Edited");
    assert_eq!(stored.created_at, post.created_at);
}

#[tokio::test]
async fn non_author_is_sent_back_to_the_post() {
    let app = TestApp::new();
    let author = app.create_user("RingoStarr").await;
    let stranger = app.create_user("Stranger").await;
    let post = app.create_post(&author, "Original", None).await;
    let edit = format!("/posts/{}/edit/", post.id);
    let detail = format!("/posts/{}/", post.id);

    app.get(&edit, Some(&stranger.access_token))
        .await
        .assert_redirect(&detail);
    app.post_multipart(
        &edit,
        &[Part::Text("text", "Hijacked")],
        Some(&stranger.access_token),
    )
    .await
    .assert_redirect(&detail);

    let stored = app.repository.fetch_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.text.get(), "Original");
}

#[tokio::test]
async fn editing_without_upload_keeps_the_image() {
    let app = TestApp::new();
    let author = app.create_user("RingoStarr").await;
    app.post_multipart(
        "/create/",
        &[
            Part::Text("text", "With a picture"),
            Part::File("image", "small.gif", SMALL_GIF),
        ],
        Some(&author.access_token),
    )
    .await;
    let post = app.repository.list_posts(PostFilter::All, 1, 0).await.unwrap()[0].clone();

    app.post_multipart(
        &format!("/posts/{}/edit/", post.id),
        &[
            Part::Text("text", "Still with a picture"),
            Part::File("image", "", b""),
        ],
        Some(&author.access_token),
    )
    .await
    .assert_redirect(&format!("/posts/{}/", post.id));

    let stored = app.repository.fetch_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.text.get(), "Still with a picture");
    assert_eq!(stored.image, post.image);
}

#[tokio::test]
async fn invalid_edit_keeps_the_post() {
    let app = TestApp::new();
    let author = app.create_user("RingoStarr").await;
    let post = app.create_post(&author, "Original", None).await;

    let response = app
        .post_multipart(
            &format!("/posts/{}/edit/", post.id),
            &[Part::Text("text", "")],
            Some(&author.access_token),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["is_edit"], true);
    assert_eq!(
        response.json()["errors"],
        json!({ "text": ["This field is required."] })
    );
    let stored = app.repository.fetch_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.text.get(), "Original");
}

#[tokio::test]
async fn only_signed_in_users_comment() {
    let app = TestApp::new();
    let author = app.create_user("RingoStarr").await;
    let reader = app.create_user("reader").await;
    let post = app.create_post(&author, "Commented", None).await;
    let comment = format!("/posts/{}/comment/", post.id);
    let detail = format!("/posts/{}/", post.id);

    app.post_form(&comment, &[("text", "Anonymous")], None)
        .await
        .assert_redirect(&format!(
            "/auth/login/?next=%2Fposts%2F{}%2Fcomment%2F",
            post.id
        ));
    assert!(app.repository.list_comments(post.id).await.unwrap().is_empty());

    app.post_form(&comment, &[("text", "Nice post")], Some(&reader.access_token))
        .await
        .assert_redirect(&detail);
    let comments = app.repository.list_comments(post.id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text.get(), "Nice post");
    assert_eq!(comments[0].author, reader.user);

    let page = app.get(&detail, None).await;
    assert_eq!(page.json()["comments"][0]["text"], "Nice post");
}

#[tokio::test]
async fn blank_comment_is_ignored() {
    let app = TestApp::new();
    let author = app.create_user("RingoStarr").await;
    let post = app.create_post(&author, "Commented", None).await;

    app.post_form(
        &format!("/posts/{}/comment/", post.id),
        &[("text", "   ")],
        Some(&author.access_token),
    )
    .await
    .assert_redirect(&format!("/posts/{}/", post.id));

    assert!(app.repository.list_comments(post.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn commenting_on_a_missing_post_is_not_found() {
    let app = TestApp::new();
    let reader = app.create_user("reader").await;

    let response = app
        .post_form(
            "/posts/9999/comment/",
            &[("text", "Hello?")],
            Some(&reader.access_token),
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
