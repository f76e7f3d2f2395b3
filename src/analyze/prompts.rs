//! Prompt texts. The rubric is configuration handed to the model; nothing in the
//! crate evaluates it.

use serde_json::json;

use crate::analyze::ai_adapter::ResponseSchema;
use crate::analyze::types::ImportantNewsRecord;

/// Built-in importance rubric (overridable with `llm.rubric_path`).
pub const DEFAULT_RUBRIC: &str = r#"Importance criteria (by expected market impact):

[HIGH - may trigger major market moves]
- Major decisions or policy changes by SEC, CFTC, the Fed or other regulators (rate decisions, regulatory frameworks, enforcement actions)
- Large institutions (> $1B) entering or exiting crypto or equities for the first time
- Major ETF approvals/rejections or flows above $500M
- Major upgrades, forks or security incidents of Bitcoin/Ethereum
- Major exchange events (collapse, hack, regulatory penalty, outage)
- Bitcoin/Ethereum single-day move > 15% or a new all-time high/low
- S&P 500 / Nasdaq single-day move > 3%
- Macro data surprises (inflation, employment, GDP)
- Geopolitical shocks (war, sanctions, trade disputes) and systemic financial risk (bank failures, liquidity crises)

[MEDIUM - may move a sector or short-term sentiment]
- Mid-size institutions ($100M-$1B) changing crypto/equity strategy
- Regional regulatory adjustments or guidance
- Technology updates or partnerships of top-10 coins or well-known listed companies
- Notable launches in DeFi, NFT, Web3, AI, new energy
- Market commentary by prominent investors, founders or analysts
- Large-company earnings surprises or major business changes
- Industry policy changes (AI regulation, energy subsidies)
- 5-15% moves in major coins or well-known stocks

[LOW - limited market impact]
- Routine updates of small projects, generic analysis or price predictions
- Retail investor behaviour, meme coins, niche projects
- Routine corporate operations or personnel changes, moves below 5%
- News unrelated to financial markets"#;

const ANALYST_ROLE: &str = "You are a senior financial analyst covering crypto and US equity markets. \
Assess objectively how important the news is for those markets.";

/// System prompt for the structured-output tier.
pub fn structured_system_prompt(rubric: &str) -> String {
    format!(
        "{ANALYST_ROLE}\n\n{rubric}\n\nReturn:\n\
- importance: one of 高 (high), 中 (medium), 低 (low)\n\
- summary: for 中/高, a concise summary (max 200 characters) focused on the market impact; empty for 低\n\
- keywords: for 中/高, 3-5 comma-separated keywords including market-impact terms; empty for 低"
    )
}

pub fn structured_user_prompt(content: &str) -> String {
    format!("News content: {content}")
}

/// JSON schema for the structured-output tier.
pub fn verdict_schema() -> ResponseSchema {
    ResponseSchema {
        name: "news_analysis".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "importance": { "type": "string", "enum": ["高", "中", "低"] },
                "summary": { "type": "string" },
                "keywords": { "type": "string" }
            },
            "required": ["importance", "summary", "keywords"],
            "additionalProperties": false
        }),
    }
}

/// Single free-text prompt for the JSON-extraction fallback tier.
pub fn json_fallback_prompt(content: &str, rubric: &str) -> String {
    format!(
        "Analyze how important the following news is for crypto and US equity markets and reply in JSON.\n\n\
News content: {content}\n\n{rubric}\n\n\
Reply strictly in this JSON format:\n\
{{\n  \"importance\": \"高/中/低\",\n  \"summary\": \"summary focused on market impact (may be empty for 低)\",\n  \"keywords\": \"keyword1,keyword2,keyword3 (may be empty for 低)\"\n}}\n\n\
Return only the JSON, nothing else."
    )
}

/// `"{i}. {summary} (importance: {importance})"`, one per line, 1-based.
pub fn numbered_summaries(records: &[ImportantNewsRecord]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {} (importance: {})", i + 1, r.summary, r.importance))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn compose_prompt(numbered: &str) -> String {
    format!(
        "Based on the following important news summaries, write one cohesive daily digest:\n\n\
{numbered}\n\n\
The digest should:\n\
1. Be at most 300 characters\n\
2. Lead with the most important events\n\
3. Point out connections between related events\n\
4. Use professional but accessible language"
    )
}

pub fn merge_prompt(existing: &str, numbered: &str) -> String {
    format!(
        "Merge the existing news digest with the newly found important news into one consolidated digest.\n\n\
Existing digest:\n{existing}\n\n\
New important news:\n{numbered}\n\n\
Requirements:\n\
1. Integrate all important information without repeating facts\n\
2. Lead with the most important events and trends\n\
3. Point out connections between related events\n\
4. Use professional but accessible language\n\
5. Keep it within 400 characters\n\
6. Order content by importance, then recency"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::types::Importance;

    fn rec(summary: &str, importance: Importance) -> ImportantNewsRecord {
        ImportantNewsRecord {
            original_title: "t".into(),
            original_content: "c".into(),
            importance,
            summary: summary.into(),
            keywords: String::new(),
        }
    }

    #[test]
    fn numbered_list_format() {
        let out = numbered_summaries(&[
            rec("Fed cuts rates", Importance::High),
            rec("Tesla beats", Importance::Medium),
        ]);
        assert_eq!(
            out,
            "1. Fed cuts rates (importance: HIGH)\n2. Tesla beats (importance: MEDIUM)"
        );
    }

    #[test]
    fn prompts_embed_inputs() {
        assert!(json_fallback_prompt("NEWS-X", "RUBRIC-Y").contains("NEWS-X"));
        assert!(json_fallback_prompt("NEWS-X", "RUBRIC-Y").contains("RUBRIC-Y"));
        assert!(structured_system_prompt("RUBRIC-Y").contains("RUBRIC-Y"));
        let m = merge_prompt("OLD", "1. new (importance: HIGH)");
        assert!(m.contains("OLD") && m.contains("1. new"));
    }

    #[test]
    fn schema_requires_all_fields() {
        let s = verdict_schema();
        assert_eq!(s.schema["required"].as_array().unwrap().len(), 3);
    }
}
