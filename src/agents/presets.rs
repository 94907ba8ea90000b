//! Agent descriptors for the stock analyst team

use super::{slugify, AgentDescriptor};
use crate::tools::ToolKind;

/// Shown by the chat surface before the first question
pub const GREETING: &str = "Hello! I am your AI Stock Analyst Agent.
For any stock that you may provide, I can provide you with comprehensive financial insights including:
- Current stock prices and key fundamentals
- Detailed company information
- Financial statements (Income Statement, Balance Sheet, Cash Flow)
- Technical indicators (e.g., RSI, MACD)
- Recent company news & recommendations";

fn descriptor(
    name: &str,
    role: Option<&str>,
    instructions: Vec<String>,
    tools: Vec<ToolKind>,
) -> AgentDescriptor {
    AgentDescriptor {
        id: slugify(name),
        name: name.to_string(),
        role: role.map(str::to_string),
        instructions,
        tools,
        show_tool_calls: true,
        markdown: true,
    }
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn web_search_agent() -> AgentDescriptor {
    descriptor(
        "Web Search Agent",
        Some("Search the web for accurate and up-to-date financial information"),
        lines(&[
            "1. Perform targeted searches to find the most relevant and recent financial information.",
            "2. Always verify the credibility of sources before including them in the response.",
            "3. Summarize the information concisely and include direct links to the sources.",
            "4. If no relevant information is found, state this clearly and suggest alternative search terms.",
        ]),
        vec![ToolKind::DuckDuckGoSearch, ToolKind::DuckDuckGoNews],
    )
}

/// Which market data tools the finance agent gets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinanceToolSet {
    pub stock_price: bool,
    pub stock_fundamentals: bool,
    pub analyst_recommendations: bool,
    pub company_news: bool,
    pub company_info: bool,
    pub income_statements: bool,
    pub technical_indicators: bool,
}

impl FinanceToolSet {
    /// Prices, fundamentals, recommendations and news (playground)
    pub fn standard() -> Self {
        Self {
            stock_price: true,
            stock_fundamentals: true,
            analyst_recommendations: true,
            company_news: true,
            company_info: false,
            income_statements: false,
            technical_indicators: false,
        }
    }

    /// Everything, including profile, statements and indicators (chat team)
    pub fn comprehensive() -> Self {
        Self {
            company_info: true,
            income_statements: true,
            technical_indicators: true,
            ..Self::standard()
        }
    }

    pub fn kinds(&self) -> Vec<ToolKind> {
        [
            (self.stock_price, ToolKind::StockPrice),
            (self.stock_fundamentals, ToolKind::StockFundamentals),
            (self.analyst_recommendations, ToolKind::AnalystRecommendations),
            (self.company_news, ToolKind::CompanyNews),
            (self.company_info, ToolKind::CompanyInfo),
            (self.income_statements, ToolKind::IncomeStatements),
            (self.technical_indicators, ToolKind::TechnicalIndicators),
        ]
        .into_iter()
        .filter_map(|(enabled, kind)| enabled.then_some(kind))
        .collect()
    }
}

pub fn finance_agent(tools: FinanceToolSet) -> AgentDescriptor {
    let mut details = Vec::new();
    if tools.stock_price {
        details.push("   - Current price");
    }
    if tools.stock_fundamentals {
        details.push("   - Key fundamentals (e.g., P/E ratio, market cap)");
    }
    if tools.company_info {
        details.push("   - Company information");
    }
    if tools.income_statements {
        details.push("   - Financial statements (Income Statement, Balance Sheet, Cash Flow)");
    }
    if tools.technical_indicators {
        details.push("   - Technical indicators (e.g., RSI, MACD)");
    }
    if tools.analyst_recommendations {
        details.push("   - Latest analyst recommendations (Buy/Hold/Sell)");
    }
    if tools.company_news {
        details.push("   - Recent company news (last 7 days)");
    }

    let mut instructions = lines(&[
        "1. Use tables to display stock data for better readability.",
        "2. Always include the following details for any stock:",
    ]);
    instructions.extend(lines(&details));
    instructions.extend(lines(&[
        "3. If data is unavailable, explain why and suggest alternative tools or sources.",
        "4. Keep the response concise and avoid unnecessary details.",
    ]));

    descriptor(
        "Finance AI Agent",
        Some("Retrieve and analyze stock market data for ticker symbols"),
        instructions,
        tools.kinds(),
    )
}

/// Leader of the team; its delegation tools are added by the team itself.
pub fn coordinator() -> AgentDescriptor {
    descriptor(
        "Stock Analyst Team",
        None,
        lines(&[
            "1. Use the web search agent to find the latest financial news and updates.",
            "2. Use the financial agent to analyze stock data and provide structured insights.",
            "3. Always combine the results from both agents into a single, cohesive response.",
            "4. Follow these formatting guidelines:",
            "   - Use headings to separate sections (e.g., 'Latest News', 'Stock Analysis').",
            "   - Use tables for numerical data.",
            "   - Include clickable links for all sources.",
            "   - Note the source or data provider behind every figure and claim.",
            "5. If the user's query is unclear, ask for clarification before proceeding.",
        ]),
        Vec::new(),
    )
}
