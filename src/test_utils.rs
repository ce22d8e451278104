
/// Mock payload helpers for tests
#[cfg(test)]
pub mod mocks {
    use serde_json::json;

    /// Canonical module result JSON with the given score, as a model would
    /// return it.
    pub fn module_result_json(score: i64) -> String {
        json!({
            "summary": {
                "score": score,
                "compliance_level": if score >= 80 { "AA" } else { "PARTIAL" },
                "overall_assessment": "Mocked assessment."
            },
            "criteria_evaluation": [{
                "criterion_id": "1.1.1",
                "name": "Non-text Content",
                "status": if score >= 65 { "PASSED" } else { "FAILED" },
                "finding": "mock",
                "impact": "mock",
                "recommendation": "mock",
                "examples": [],
                "severity": "minor"
            }],
            "priority_actions": {
                "immediate": [{"title": "Mock action", "description": "d"}],
                "short_term": [],
                "long_term": []
            }
        })
        .to_string()
    }

    /// Wraps text in a Gemini generateContent response body.
    pub fn gemini_response(text: &str) -> String {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }] }
            }],
            "usageMetadata": {
                "promptTokenCount": 100,
                "candidatesTokenCount": 50
            }
        })
        .to_string()
    }

    /// A small accessible page with one internal link.
    pub fn basic_html_page(title: &str, h1: &str) -> String {
        format!(
            r#"<html lang="en">
                <head><title>{}</title></head>
                <body>
                    <main><h1>{}</h1><p>Some content here.</p></main>
                </body>
            </html>"#,
            title, h1
        )
    }
}
