// tests/api_tests.rs

mod common;

use common::{spawn_app, start_assessment};
use quizbot::provider::{RunStatus, scripted::Step};
use serde_json::{Value, json};

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_user_works() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let device_id = format!("dev_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    let response = client
        .post(format!("{}/api/users", app.address))
        .json(&json!({ "deviceId": device_id, "name": "Ada" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);
    let user: Value = response.json().await.unwrap();
    assert_eq!(user["deviceId"], device_id.as_str());
    assert_eq!(user["status"], "active");

    // Same device again
    let response = client
        .post(format!("{}/api/users", app.address))
        .json(&json!({ "deviceId": device_id, "name": "Ada" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let id = user["id"].as_i64().unwrap();
    let response = client
        .get(format!("{}/api/users/{}", app.address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .delete(format!("{}/api/users/{}", app.address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = client
        .get(format!("{}/api/users/{}", app.address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_user_validates_payload() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/users", app.address))
        .json(&json!({ "deviceId": "", "name": "Ada" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn list_assessment_types() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/assessment-types", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let types: Vec<Value> = response.json().await.unwrap();
    let ids: Vec<&str> = types.iter().filter_map(|t| t["id"].as_str()).collect();
    assert!(ids.contains(&"quiz"));
    assert!(ids.contains(&"open_question"));
}

#[tokio::test]
async fn start_unknown_type_is_404() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/assessments/poetry", app.address))
        .json(&json!({ "userDeviceId": "device-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn start_with_malformed_type_is_400() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/assessments/Bad%20Type", app.address))
        .json(&json!({ "userDeviceId": "device-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn full_assessment_flow() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let id = start_assessment(&app, &client, "quiz").await;
    let base = format!("{}/api/assessments/quiz/{}", app.address, id);

    // Fresh assessment is in progress
    let status: Value = client
        .get(format!("{}/status", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["completed"], false);
    assert_eq!(status["state"], "in_progress");

    // Question
    app.provider.push_run(vec![Step::tool(
        "generateQuestions",
        json!({"content": "2+2?", "options": ["3", "4"], "correctAnswer": "4"}),
    )]);
    let response = client
        .post(format!("{}/questions", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let question: Value = response.json().await.unwrap();
    assert_eq!(question["content"], "2+2?");
    assert!(question.get("correctAnswer").is_none());

    // Answer
    app.provider.push_run(vec![Step::tool(
        "handleUserInput",
        json!({"userAnswer": "4", "isCorrect": true, "explanation": "Correct"}),
    )]);
    let response = client
        .post(format!("{}/answers", base))
        .json(&json!({ "answer": "4", "takenTime": 1500 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let outcome: Value = response.json().await.unwrap();
    assert_eq!(outcome["isCorrect"], true);
    assert_eq!(outcome["explanation"], "Correct");

    // Complete
    app.provider.push_run(vec![
        Step::tool("retrieveAssessment", json!({ "assessmentId": id })),
        Step::tool("feedback", json!({"feedback": "Well done"})),
    ]);
    let response = client
        .post(format!("{}/complete", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let quiz = &body["quiz"];
    assert_eq!(quiz["assessmentState"], "completed");
    assert_eq!(quiz["feedback"], "Well done");
    assert!(quiz["endTime"].is_string());
    assert_eq!(quiz["assessmentDetails"]["answeredQuestions"], 1);
    assert_eq!(quiz["assessmentDetails"]["correctAnswers"], 1);
    assert_eq!(quiz["assessmentDetails"]["questions"][0]["yourAnswer"], "4");
    assert_eq!(quiz["assessmentDetails"]["questions"][0]["takenTime"], 1500);

    let status: Value = client
        .get(format!("{}/status", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["completed"], true);

    // Summary matches what complete returned
    let summary: Value = client.get(&base).send().await.unwrap().json().await.unwrap();
    assert_eq!(&summary, quiz);

    // No more answers once completed
    let response = client
        .post(format!("{}/answers", base))
        .json(&json!({ "answer": "5" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn wrong_type_in_path_is_404() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let id = start_assessment(&app, &client, "quiz").await;

    let response = client
        .get(format!(
            "{}/api/assessments/open_question/{}/status",
            app.address, id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn empty_answer_is_400() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let id = start_assessment(&app, &client, "open_question").await;

    let response = client
        .post(format!(
            "{}/api/assessments/open_question/{}/answers",
            app.address, id
        ))
        .json(&json!({ "answer": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn failed_run_is_502() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let id = start_assessment(&app, &client, "open_question").await;

    app.provider
        .push_run(vec![Step::Failed("model overloaded".to_string())]);
    let response = client
        .post(format!(
            "{}/api/assessments/open_question/{}/questions",
            app.address, id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 502);

    // Assessment stays usable
    let status: Value = client
        .get(format!(
            "{}/api/assessments/open_question/{}/status",
            app.address, id
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["state"], "in_progress");
}

#[tokio::test]
async fn stuck_run_is_504() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let id = start_assessment(&app, &client, "open_question").await;

    app.provider
        .push_run(vec![Step::Status(RunStatus::InProgress); 20]);
    let response = client
        .post(format!(
            "{}/api/assessments/open_question/{}/questions",
            app.address, id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 504);
}
