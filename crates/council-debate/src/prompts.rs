//! Prompt templates for debate agents
//!
//! Rendered with MiniJinja. Numbers are pre-formatted in Rust so templates
//! only interpolate strings.

use crate::error::{DebateError, Result};
use crate::model::{AgentIdentity, MarketContext, Stance};
use minijinja::{Environment, context};

const MARKET_CONTEXT: &str = r"
Current Price: ${{ price }}
Move Today: {{ direction }} {{ pct }}%
Trading Volume: {{ volume }}
Symbol: {{ subject }}

ECONOMIC CALENDAR & NEWS:
{{ economic_context or 'No scheduled economic events.' }}

Provide a realistic analysis from your agent perspective. Be specific, use data-driven reasoning.
Include 3-4 supporting points with concrete details.
Consider the economic calendar events when evaluating market drivers.
";

const USER_PROMPT: &str = r#"Analyze {{ subject }} {{ direction }} {{ pct }}% today.
{{ market_context }}
Respond in JSON format ONLY (no markdown):
{
    "thesis": "One sentence with numbers",
    "supporting_points": ["point 1", "point 2", "point 3"],
    "confidence": "high"
}"#;

const SYSTEM_PROMPT: &str = r"You are {{ name }}, a {{ role }} on a market debate council.
{% if stance == 'macro' %}
Explain the move through rates, central bank policy, macro data releases, the dollar and sector rotation.
{% elif stance == 'fundamental' %}
Explain the move through company fundamentals: earnings, guidance, margins, valuation and filings.
{% elif stance == 'flow' %}
Explain the move through market microstructure: volume, block trades, options positioning and fund flows.
{% elif stance == 'technical' %}
Explain the move through price action: trend, support and resistance, momentum and volume confirmation.
{% elif stance == 'skeptic' %}
Challenge the obvious narrative. Look for what could make this move fail or reverse, and what would confirm it.
{% else %}
Give your independent read of what is driving the move.
{% endif %}
State a single clear thesis backed by concrete figures. Never invent data you were not given.
Answer with a single JSON object and nothing else.";

/// Renders the shared market block, the per-agent user prompt and system prompts
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl PromptBuilder {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("market_context", MARKET_CONTEXT)?;
        env.add_template("user_prompt", USER_PROMPT)?;
        env.add_template("system_prompt", SYSTEM_PROMPT)?;
        Ok(Self { env })
    }

    /// Market figures and economic calendar shared by every agent
    pub fn market_context(&self, market: &MarketContext) -> Result<String> {
        let rendered = self.env.get_template("market_context")?.render(context! {
            price => format!("{:.2}", market.price),
            direction => market.direction.to_string(),
            pct => format!("{:.2}", market.abs_move()),
            volume => group_thousands(market.volume),
            subject => &market.subject,
            economic_context => market
                .economic_context
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty()),
        })?;
        Ok(rendered)
    }

    /// Task prompt asking for the JSON answer
    pub fn user_prompt(&self, market: &MarketContext) -> Result<String> {
        let rendered = self.env.get_template("user_prompt")?.render(context! {
            subject => &market.subject,
            direction => market.direction.to_string(),
            pct => format!("{:.2}", market.abs_move()),
            market_context => self.market_context(market)?,
        })?;
        Ok(rendered)
    }

    /// Role instructions, or the identity's own override
    pub fn system_prompt(&self, identity: &AgentIdentity) -> Result<String> {
        if let Some(custom) = &identity.system_prompt {
            return Ok(custom.clone());
        }

        let rendered = self.env.get_template("system_prompt")?.render(context! {
            name => &identity.name,
            role => identity.role.to_lowercase(),
            stance => stance_key(identity.stance),
        })?;
        Ok(rendered)
    }
}

fn stance_key(stance: Stance) -> &'static str {
    match stance {
        Stance::Macro => "macro",
        Stance::Fundamental => "fundamental",
        Stance::Flow => "flow",
        Stance::Technical => "technical",
        Stance::Skeptic => "skeptic",
        Stance::Other => "other",
    }
}

/// `50000000` -> `50,000,000`
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl From<minijinja::Error> for DebateError {
    fn from(err: minijinja::Error) -> Self {
        DebateError::Configuration(format!("prompt template error: {err}"))
    }
}
