/// Task and image upload tests
///
/// Tasks are created with multipart bodies; images land in the context's
/// temporary upload directory and are served back under `/uploads`.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    empty_request, multipart_request, png_bytes, FilePart, TestContext, MAX_UPLOAD_BYTES,
};

fn uploaded_files(ctx: &TestContext) -> usize {
    std::fs::read_dir(ctx.upload_dir.path()).unwrap().count()
}

#[tokio::test]
async fn test_create_task_stores_and_serves_image() {
    let ctx = TestContext::new();
    let a = ctx.register("a@example.com", "A").await;
    let g = ctx.create_group(&a, "Chores", "private").await;
    let png = png_bytes();

    let (status, task) = ctx
        .send(multipart_request(
            Method::POST,
            "/api/tasks",
            &a,
            &[("title", "Take out trash"), ("groupId", g.to_string().as_str())],
            Some(FilePart {
                file_name: "trash bin.png",
                content_type: "image/png",
                data: &png,
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", task);
    assert_eq!(task["title"], "Take out trash");
    assert_eq!(task["status"], "todo");
    assert_eq!(task["groupId"], g.to_string());
    assert_eq!(task["creator"]["id"], a.id.to_string());
    assert_eq!(task["creator"]["displayName"], "A");

    let url = task["imageUrl"].as_str().unwrap();
    assert!(url.starts_with("/uploads/trashbin_"));
    assert!(url.ends_with(".png"));

    let (status, served) = ctx.send_raw(empty_request(Method::GET, url, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(served, png);
}

#[tokio::test]
async fn test_create_task_requires_image_and_group() {
    let ctx = TestContext::new();
    let a = ctx.register("a@example.com", "A").await;
    let g = ctx.create_group(&a, "Chores", "private").await;

    let (status, body) = ctx
        .send(multipart_request(
            Method::POST,
            "/api/tasks",
            &a,
            &[("title", "No picture"), ("groupId", g.to_string().as_str())],
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "image");
    assert_eq!(body["details"][0]["message"], "No file uploaded");

    let png = png_bytes();
    let (status, body) = ctx
        .send(multipart_request(
            Method::POST,
            "/api/tasks",
            &a,
            &[("title", "Lost")],
            Some(FilePart {
                file_name: "a.png",
                content_type: "image/png",
                data: &png,
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "groupId");
    assert_eq!(uploaded_files(&ctx), 0);
}

#[tokio::test]
async fn test_rejects_wrong_type_and_oversized_images() {
    let ctx = TestContext::new();
    let a = ctx.register("a@example.com", "A").await;
    let g = ctx.create_group(&a, "Chores", "private").await;
    let group_id = g.to_string();

    let (status, body) = ctx
        .send(multipart_request(
            Method::POST,
            "/api/tasks",
            &a,
            &[("title", "Doc"), ("groupId", group_id.as_str())],
            Some(FilePart {
                file_name: "notes.pdf",
                content_type: "application/pdf",
                data: b"%PDF-1.4",
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["details"][0]["message"],
        "Invalid file type. Only JPEG, PNG and GIF are allowed."
    );

    let huge = vec![0u8; MAX_UPLOAD_BYTES + 1];
    let (status, body) = ctx
        .send(multipart_request(
            Method::POST,
            "/api/tasks",
            &a,
            &[("title", "Huge"), ("groupId", group_id.as_str())],
            Some(FilePart {
                file_name: "huge.jpg",
                content_type: "image/jpeg",
                data: &huge,
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "image");
    assert!(body["details"][0]["message"]
        .as_str()
        .unwrap()
        .starts_with("File too large"));

    assert_eq!(uploaded_files(&ctx), 0);
}

#[tokio::test]
async fn test_non_member_cannot_post_and_image_is_discarded() {
    let ctx = TestContext::new();
    let a = ctx.register("a@example.com", "A").await;
    let b = ctx.register("b@example.com", "B").await;
    let g = ctx.create_group(&a, "Open", "public").await;
    let png = png_bytes();

    let (status, body) = ctx
        .send(multipart_request(
            Method::POST,
            "/api/tasks",
            &b,
            &[("title", "Sneaky"), ("groupId", g.to_string().as_str())],
            Some(FilePart {
                file_name: "a.png",
                content_type: "image/png",
                data: &png,
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You must be a member of this group");
    assert_eq!(uploaded_files(&ctx), 0);
}

#[tokio::test]
async fn test_update_list_and_delete_tasks() {
    let ctx = TestContext::new();
    let a = ctx.register("a@example.com", "A").await;
    let b = ctx.register("b@example.com", "B").await;
    let g = ctx.create_group(&a, "Chores", "private").await;
    let png = png_bytes();

    let (_, task) = ctx
        .send(multipart_request(
            Method::POST,
            "/api/tasks",
            &a,
            &[("title", "Dishes"), ("groupId", g.to_string().as_str())],
            Some(FilePart {
                file_name: "dishes.png",
                content_type: "image/png",
                data: &png,
            }),
        ))
        .await;
    let task_id = task["id"].as_str().unwrap().to_string();
    let uri = format!("/api/tasks/{task_id}");

    let (status, updated) = ctx
        .send(multipart_request(Method::PUT, &uri, &a, &[("status", "done")], None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "done");
    assert_eq!(updated["title"], "Dishes");
    assert_eq!(updated["imageUrl"], task["imageUrl"]);

    let (status, body) = ctx
        .send(multipart_request(Method::PUT, &uri, &a, &[("status", "later")], None))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "status");

    // Outsiders see nothing and change nothing
    let (status, _) = ctx
        .send(empty_request(Method::GET, &format!("/api/tasks?groupId={g}"), Some(&b)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, listed) = ctx.send(empty_request(Method::GET, "/api/tasks", Some(&b))).await;
    assert_eq!(listed.as_array().unwrap().len(), 0);
    let (status, _) = ctx
        .send(multipart_request(Method::PUT, &uri, &b, &[("title", "Mine")], None))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, listed) = ctx
        .send(empty_request(Method::GET, &format!("/api/tasks?groupId={g}"), Some(&a)))
        .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["creator"]["email"], "a@example.com");

    let (status, body) = ctx.send(empty_request(Method::DELETE, &uri, Some(&a))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task removed");

    let (status, _) = ctx.send(empty_request(Method::DELETE, &uri, Some(&a))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_group_delete_cascades_to_tasks() {
    let ctx = TestContext::new();
    let a = ctx.register("a@example.com", "A").await;
    let g = ctx.create_group(&a, "Chores", "private").await;
    let png = png_bytes();

    let (status, _) = ctx
        .send(multipart_request(
            Method::POST,
            "/api/tasks",
            &a,
            &[("title", "Laundry"), ("groupId", g.to_string().as_str())],
            Some(FilePart {
                file_name: "laundry.gif",
                content_type: "image/gif",
                data: &png,
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = ctx
        .send(empty_request(Method::DELETE, &format!("/api/groups/{g}"), Some(&a)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Group removed");
    assert_eq!(body["deletedTasks"], 1);

    let (_, listed) = ctx.send(empty_request(Method::GET, "/api/tasks", Some(&a))).await;
    assert_eq!(listed.as_array().unwrap().len(), 0);
}
