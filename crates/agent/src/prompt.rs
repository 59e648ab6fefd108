//! Prompt assembly for the completion model

use crate::transcript::Transcript;

/// Stop sequence closing the query section
pub const STOP_SEQUENCE: &str = "END-QUERY";

/// Builds completion prompts for one task
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    task: String,
}

impl PromptBuilder {
    pub fn new(task: impl Into<String>) -> Self {
        Self { task: task.into() }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    fn preamble(&self) -> String {
        format!(
            r#"I have a task to perform on a SQLite database. You must provide a response in SQL.

Each time you respond, provide exactly one SQL query which will help you gather more information. I will give the responses of that query back to you.

Do not return the final answer until you are confident. Do not include any information that you did not get from this specific database. Do not provide a response to the query; wait for me to do that.

The task is: {}."#,
            self.task.trim().trim_end_matches('.')
        )
    }

    /// Prompt asking the model to restate its approach in prose
    pub fn plan_prompt(&self) -> String {
        format!(
            "{}\n\nBefore writing any SQL, describe step by step how you will solve this task. Do not write any SQL.\n\nPLAN:\n",
            self.preamble()
        )
    }

    /// Full prompt: preamble, plan (when given), every turn, then an open
    /// `FINAL:` line for the model to continue
    pub fn build(&self, transcript: &Transcript, plan: Option<&str>) -> String {
        let mut parts = vec![self.preamble()];

        if let Some(plan) = plan.map(str::trim).filter(|p| !p.is_empty()) {
            parts.push(format!("Your plan:\n{}", plan));
        }

        parts.push(transcript.render());
        parts.push("FINAL:".to_string());

        parts.join("\n\n")
    }
}
