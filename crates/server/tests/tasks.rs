mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::spawn_app;

#[tokio::test]
async fn task_creation_validates_and_links_the_client() {
    let app = spawn_app().await;
    let client = app.create_client("tasks@example.com", "LAUNCH").await;

    let missing = app.post("/api/tasks", json!({ "client_id": client, "title": " " })).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let bad_type = app
        .post("/api/tasks", json!({ "client_id": client, "title": "Logo", "type": "FAX" }))
        .await;
    assert_eq!(bad_type.status, StatusCode::BAD_REQUEST);

    let bad_due = app
        .post("/api/tasks", json!({ "client_id": client, "title": "Logo", "due_date": "soon" }))
        .await;
    assert_eq!(bad_due.status, StatusCode::BAD_REQUEST);

    let unknown = app
        .post("/api/tasks", json!({ "client_id": "nope", "title": "Logo" }))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.body["error"], "Client not found");

    let created = app
        .post(
            "/api/tasks",
            json!({ "client_id": client, "title": "Send logo", "due_date": "2025-06-01" }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{:?}", created.body);
    assert_eq!(created.body["type"], "OTHER");
    assert_eq!(created.body["status"], "PENDING");
    assert_eq!(created.body["due_date"], "2025-06-01T00:00:00+00:00");
    assert_eq!(created.body["created_by"], "ops@example.com");
    assert_eq!(created.body["attachments"], json!([]));
    assert_eq!(created.body["metadata"], json!({}));
    assert_eq!(created.body["client"]["email"], "tasks@example.com");
    assert_eq!(created.body["client"]["plan"], "LAUNCH");
}

#[tokio::test]
async fn tasks_can_be_filtered() {
    let app = spawn_app().await;
    let first = app.create_client("one@example.com", "LAUNCH").await;
    let second = app.create_client("two@example.com", "GROWTH").await;

    app.create_task(&first, "Upload logo").await;
    let review = app
        .post(
            "/api/tasks",
            json!({ "client_id": second, "title": "Review copy", "type": "REVIEW", "status": "IN_PROGRESS" }),
        )
        .await;
    assert_eq!(review.status, StatusCode::CREATED);

    let all = app.get("/api/tasks").await;
    assert_eq!(all.body["count"], 2);

    let by_client = app.get(&format!("/api/tasks?client_id={first}")).await;
    assert_eq!(by_client.body["count"], 1);
    assert_eq!(by_client.body["tasks"][0]["title"], "Upload logo");

    let by_type = app.get("/api/tasks?type=REVIEW&status=IN_PROGRESS").await;
    assert_eq!(by_type.body["count"], 1);
    assert_eq!(by_type.body["tasks"][0]["client"]["email"], "two@example.com");

    let bad = app.get("/api/tasks?status=DONE").await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn completion_timestamp_follows_status() {
    let app = spawn_app().await;
    let client = app.create_client("done@example.com", "LAUNCH").await;
    let task = app.create_task(&client, "Provide brand colors").await;
    let uri = format!("/api/tasks/{task}");

    let completed = app.patch(&uri, json!({ "status": "COMPLETED" })).await;
    assert_eq!(completed.status, StatusCode::OK);
    let completed_at = completed.body["completed_at"].as_str().unwrap().to_string();

    let retitled = app
        .patch(&uri, json!({ "title": "Provide brand palette", "status": "COMPLETED" }))
        .await;
    assert_eq!(retitled.body["completed_at"], completed_at.as_str());
    assert_eq!(retitled.body["title"], "Provide brand palette");

    let reopened = app.patch(&uri, json!({ "status": "IN_PROGRESS" })).await;
    assert!(reopened.body["completed_at"].is_null());
}

#[tokio::test]
async fn patch_distinguishes_null_from_absent() {
    let app = spawn_app().await;
    let client = app.create_client("null@example.com", "GROWTH").await;
    let task = app.create_task(&client, "Describe audience").await;
    let uri = format!("/api/tasks/{task}");

    let described = app
        .patch(&uri, json!({ "description": "Who buys?", "due_date": "2025-07-01" }))
        .await;
    assert_eq!(described.body["description"], "Who buys?");

    let untouched = app.patch(&uri, json!({ "type": "SEND_INFO" })).await;
    assert_eq!(untouched.body["description"], "Who buys?");
    assert_eq!(untouched.body["type"], "SEND_INFO");

    let cleared = app
        .patch(&uri, json!({ "description": null, "due_date": null }))
        .await;
    assert!(cleared.body["description"].is_null());
    assert!(cleared.body["due_date"].is_null());

    let bad = app.patch(&uri, json!({ "metadata": [1, 2] })).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tasks_can_be_deleted_once() {
    let app = spawn_app().await;
    let client = app.create_client("del@example.com", "LAUNCH").await;
    let task = app.create_task(&client, "Throwaway").await;

    let removed = app.delete(&format!("/api/tasks/{task}")).await;
    assert_eq!(removed.status, StatusCode::OK);

    let gone = app.get(&format!("/api/tasks/{task}")).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    let again = app.delete(&format!("/api/tasks/{task}")).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn responses_append_to_the_thread() {
    let app = spawn_app().await;
    let client = app.create_client("thread@example.com", "LAUNCH").await;
    let task = app.create_task(&client, "Upload logo").await;
    let uri = format!("/api/tasks/{task}/responses");

    let empty = app.get(&uri).await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.body["total_responses"], 0);
    assert_eq!(empty.body["task"]["client_email"], "thread@example.com");

    let blank = app.post(&uri, json!({ "text": "   " })).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let first = app
        .post(
            &uri,
            json!({
                "text": "Logo attached",
                "attachments": [{ "name": "logo.svg", "url": "https://files.example.com/logo.svg", "type": "image/svg+xml" }]
            }),
        )
        .await;
    assert_eq!(first.status, StatusCode::CREATED, "{:?}", first.body);
    assert_eq!(first.body["response"]["created_by"], "ops@example.com");
    assert_eq!(first.body["total_responses"], 1);

    let second = app
        .post(&uri, json!({ "text": "Thanks!", "created_by": "client@example.com" }))
        .await;
    assert_eq!(second.body["total_responses"], 2);

    let thread = app.get(&uri).await;
    let responses = thread.body["responses"].as_array().unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["attachments"][0]["type"], "image/svg+xml");
    assert_eq!(responses[1]["created_by"], "client@example.com");

    let missing = app.get("/api/tasks/nope/responses").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn legacy_metadata_is_read_leniently() {
    let app = spawn_app().await;
    let client = app.create_client("legacy@example.com", "LAUNCH").await;
    let task = app.create_task(&client, "Old task").await;

    sqlx::query("UPDATE tasks SET metadata = ? WHERE id = ?")
        .bind(r#"{"responses":[{"response":"From the old form"}],"priority":"high"}"#)
        .bind(&task)
        .execute(&app.db.pool)
        .await
        .unwrap();

    let thread = app.get(&format!("/api/tasks/{task}/responses")).await;
    let created_at = app.get(&format!("/api/tasks/{task}")).await.body["created_at"].clone();
    assert_eq!(thread.body["responses"][0]["text"], "From the old form");
    assert_eq!(thread.body["responses"][0]["id"], "response-0");
    assert_eq!(thread.body["responses"][0]["created_at"], created_at);

    let appended = app
        .post(&format!("/api/tasks/{task}/responses"), json!({ "text": "New reply" }))
        .await;
    assert_eq!(appended.body["total_responses"], 2);

    let detail = app.get(&format!("/api/tasks/{task}")).await;
    assert_eq!(detail.body["metadata"]["priority"], "high");

    sqlx::query("UPDATE tasks SET metadata = 'not json' WHERE id = ?")
        .bind(&task)
        .execute(&app.db.pool)
        .await
        .unwrap();
    let broken = app.get(&format!("/api/tasks/{task}/responses")).await;
    assert_eq!(broken.status, StatusCode::OK);
    assert_eq!(broken.body["total_responses"], 0);
}

async fn seed_thread(app: &common::TestApp, task_id: &str, stamps: &[&str]) {
    let responses: Vec<Value> = stamps
        .iter()
        .enumerate()
        .map(|(index, stamp)| {
            json!({
                "id": format!("{task_id}-r{index}"),
                "text": format!("reply {index}"),
                "created_at": stamp,
                "created_by": "client@example.com",
                "attachments": []
            })
        })
        .collect();
    sqlx::query("UPDATE tasks SET metadata = ? WHERE id = ?")
        .bind(json!({ "responses": responses }).to_string())
        .bind(task_id)
        .execute(&app.db.pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn all_responses_are_flattened_sorted_and_paginated() {
    let app = spawn_app().await;
    let first = app.create_client("feed-a@example.com", "LAUNCH").await;
    let second = app.create_client("feed-b@example.com", "GROWTH").await;
    let task_a = app.create_task(&first, "A").await;
    let task_b = app.create_task(&second, "B").await;

    seed_thread(&app, &task_a, &["2025-03-01T10:00:00+00:00", "2025-03-05T10:00:00+00:00"]).await;
    seed_thread(&app, &task_b, &["2025-03-03T10:00:00+00:00"]).await;

    let all = app.get("/api/tasks/responses/all").await;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(all.body["pagination"]["total"], 3);
    assert_eq!(all.body["pagination"]["limit"], 50);
    assert_eq!(all.body["pagination"]["has_more"], false);
    let ids: Vec<&str> = all.body["responses"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            format!("{task_a}-r1"),
            format!("{task_b}-r0"),
            format!("{task_a}-r0")
        ]
    );
    assert_eq!(all.body["responses"][1]["client_email"], "feed-b@example.com");
    assert_eq!(all.body["responses"][1]["task_title"], "B");

    let page = app.get("/api/tasks/responses/all?limit=1&offset=1").await;
    assert_eq!(page.body["responses"].as_array().unwrap().len(), 1);
    assert_eq!(page.body["responses"][0]["id"], format!("{task_b}-r0"));
    assert_eq!(page.body["pagination"]["has_more"], true);

    let capped = app.get("/api/tasks/responses/all?limit=500").await;
    assert_eq!(capped.body["pagination"]["limit"], 100);

    let by_email = app
        .get("/api/tasks/responses/all?client_email=feed-a@example.com")
        .await;
    assert_eq!(by_email.body["pagination"]["total"], 2);

    let windowed = app
        .get("/api/tasks/responses/all?date_from=2025-03-02&date_to=2025-03-04")
        .await;
    assert_eq!(windowed.body["pagination"]["total"], 1);
    assert_eq!(windowed.body["responses"][0]["task_id"], task_b.as_str());

    let bad = app.get("/api/tasks/responses/all?date_from=yesterday").await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn statistics_summarize_tasks() {
    let app = spawn_app().await;
    let client = app.create_client("stats@example.com", "LAUNCH").await;
    let answered = app.create_task(&client, "Answered").await;
    app.create_task(&client, "Waiting").await;

    app.post(
        &format!("/api/tasks/{answered}/responses"),
        json!({ "text": "Here you go" }),
    )
    .await;
    app.patch(&format!("/api/tasks/{answered}"), json!({ "status": "COMPLETED" }))
        .await;

    let stats = app.get("/api/tasks/statistics").await;
    assert_eq!(stats.status, StatusCode::OK);
    assert_eq!(stats.body["total_tasks"], 2);
    assert_eq!(stats.body["tasks_by_status"]["COMPLETED"], 1);
    assert_eq!(stats.body["tasks_by_status"]["PENDING"], 1);
    assert_eq!(stats.body["tasks_by_type"]["UPLOAD_FILE"], 2);
    assert_eq!(stats.body["total_responses"], 1);
    assert_eq!(stats.body["tasks_with_responses"], 1);
    assert_eq!(stats.body["tasks_without_responses"], 1);

    let other = app
        .get("/api/tasks/statistics?client_id=someone-else")
        .await;
    assert_eq!(other.body["total_tasks"], 0);

    let future = app.get("/api/tasks/statistics?date_from=2999-01-01").await;
    assert_eq!(future.body["total_tasks"], 0);
}

#[tokio::test]
async fn huge_offsets_return_an_empty_last_page() {
    let app = spawn_app().await;
    let client = app.create_client("offset@example.com", "LAUNCH").await;
    let task = app.create_task(&client, "Only task").await;
    seed_thread(&app, &task, &["2025-03-01T10:00:00+00:00"]).await;

    let res = app
        .get("/api/tasks/responses/all?offset=9223372036854775807")
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["responses"], json!([]));
    assert_eq!(res.body["pagination"]["total"], 1);
    assert_eq!(res.body["pagination"]["has_more"], false);
}

#[tokio::test]
async fn incomplete_bodies_are_rejected_as_json_errors() {
    let app = spawn_app().await;
    let client = app.create_client("bodies@example.com", "LAUNCH").await;
    let task = app.create_task(&client, "Upload logo").await;

    let no_client = app.post("/api/tasks", json!({ "title": "x" })).await;
    assert_eq!(no_client.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_client.body["error"], "client_id and title are required");

    let no_title = app.post("/api/tasks", json!({ "client_id": client })).await;
    assert_eq!(no_title.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_title.body["error"], "client_id and title are required");

    let bare_attachment = app
        .post(
            &format!("/api/tasks/{task}/responses"),
            json!({ "attachments": [{ "url": "https://files.example.com/brief.pdf" }] }),
        )
        .await;
    assert_eq!(bare_attachment.status, StatusCode::CREATED, "{:?}", bare_attachment.body);
    assert_eq!(bare_attachment.body["response"]["attachments"][0]["name"], "");

    let wrong_shape = app
        .post(&format!("/api/tasks/{task}/responses"), json!({ "text": 5 }))
        .await;
    assert_eq!(wrong_shape.status, StatusCode::BAD_REQUEST);
    assert!(wrong_shape.body["error"].is_string());

    let no_flag = app
        .patch(
            &format!("/api/projects/{client}/phases/PHASE_1/checklist"),
            json!({ "label": "Onboarding steps completed" }),
        )
        .await;
    assert_eq!(no_flag.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_flag.body["error"], "label and is_done are required");
}
