use reqwest::Client;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::new();
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "What is a Canny edge detector?".to_string());

    println!("🔍 Visual RAG client");

    println!("\n📋 Health Check:");
    let health_response = client.get(format!("{}/", base_url)).send().await?;
    println!("Status: {}", health_response.status());
    let health_json: serde_json::Value = health_response.json().await?;
    println!("Response: {}", serde_json::to_string_pretty(&health_json)?);

    println!("\n🔍 Query: {}", question);
    let query_response = client
        .post(format!("{}/api/query", base_url))
        .json(&json!({ "query": question }))
        .send()
        .await?;

    println!("Status: {}", query_response.status());
    let query_json: serde_json::Value = query_response.json().await?;
    println!("Response: {}", serde_json::to_string_pretty(&query_json)?);

    Ok(())
}
