//! Basic Gemini client usage example
//!
//! Usage: cargo run -p gemini-client --example basic -- path/to/photo.jpg

use gemini_client::{Content, GeminiClient, GenerateContentRequest};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: basic <image.jpg>")?;
    let bytes = std::fs::read(&path)?;

    // Initialize from environment
    let client = GeminiClient::from_env()?;

    let request = GenerateContentRequest::new()
        .content(
            Content::user()
                .text("Describe this photo in one sentence.")
                .inline_image("image/jpeg", &bytes),
        )
        .temperature(0.0)
        .max_output_tokens(200);

    let response = client.generate_content("gemini-2.0-flash", &request).await?;

    println!("Response: {}", response.text);
    if let Some(usage) = response.usage {
        println!("Tokens used: {}", usage.total_token_count);
    }

    Ok(())
}
