//! Output formatting for azstack
//!
//! Human-readable colored output or a single JSON document. Everything
//! printed passes through the deployment's secret registry first.

use std::sync::Arc;
use std::time::Instant;

use azstack::engine::DeploymentSummary;
use azstack::secrets::SecretRegistry;
use azstack::stacks::{OutputValue, ResolvedOutputs, StackRun};
use colored::Colorize;
use serde_json::{json, Value};

/// Output formatter for the human and JSON modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Print secret outputs in clear text
    show_secrets: bool,
    /// Values to redact from anything printed
    secrets: Arc<SecretRegistry>,
    /// Start time for duration calculations
    start_time: Instant,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, show_secrets: bool) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();

        Self {
            use_color,
            json_mode,
            show_secrets,
            secrets: Arc::new(SecretRegistry::new()),
            start_time: Instant::now(),
        }
    }

    /// Redact with this registry from now on.
    pub fn set_secrets(&mut self, secrets: Arc<SecretRegistry>) {
        self.secrets = secrets;
    }

    /// Whether the JSON mode is active.
    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    fn clean(&self, text: &str) -> String {
        self.secrets.redact(text)
    }

    /// Print a banner/header
    pub fn banner(&self, title: &str) {
        if self.json_mode {
            return;
        }

        let line = "=".repeat(title.len() + 4);
        if self.use_color {
            println!("\n{}", line.bright_blue());
            println!("{}", format!("  {}  ", title).bright_blue().bold());
            println!("{}\n", line.bright_blue());
        } else {
            println!("\n{}", line);
            println!("  {}  ", title);
            println!("{}\n", line);
        }
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.json_mode {
            return;
        }

        if self.use_color {
            println!("\n{}", title.cyan().bold());
            println!("{}", "-".repeat(title.len()).cyan());
        } else {
            println!("\n{}", title);
            println!("{}", "-".repeat(title.len()));
        }
    }

    /// Print the created resources
    pub fn resources(&self, summary: &DeploymentSummary) {
        if self.json_mode {
            return;
        }

        self.section(&format!("Resources ({})", summary.len()));
        for (urn, state) in &summary.resources {
            let id = self.clean(&state.id);
            if self.use_color {
                println!("  {} {} {}", "+".green(), urn.to_string().bright_white(), id.bright_black());
            } else {
                println!("  + {} {}", urn, id);
            }
        }
    }

    /// Print the stack outputs
    pub fn outputs(&self, outputs: &ResolvedOutputs) {
        if self.json_mode {
            return;
        }

        self.section("Outputs");
        let width = outputs.values.keys().map(String::len).max().unwrap_or(0);
        for (name, value) in &outputs.values {
            let rendered = match value.render(self.show_secrets) {
                Some(text) if value.is_secret() && self.show_secrets => text,
                Some(text) => self.clean(&text),
                None => "(unset)".to_string(),
            };
            let rendered = if self.use_color {
                match value {
                    OutputValue::Secret(_) => rendered.yellow().to_string(),
                    OutputValue::Unset => rendered.bright_black().to_string(),
                    OutputValue::Plain(_) => rendered,
                }
            } else {
                rendered
            };
            println!("  {:width$}  {}", name, rendered, width = width);
        }
    }

    /// Print a finished run: the full report in human mode, one JSON
    /// document otherwise.
    pub fn run(&self, stack: &str, provider: &str, run: &StackRun) {
        if self.json_mode {
            let report = run_report(stack, provider, run, self.show_secrets);
            println!("{}", self.render_json(&report));
            return;
        }

        self.resources(&run.summary);
        self.outputs(&run.outputs);

        let elapsed = self.start_time.elapsed();
        let line = format!(
            "{} resources created by {} in {:.2}s",
            run.summary.len(),
            provider,
            elapsed.as_secs_f64()
        );
        if self.use_color {
            println!("\n{}", line.green().bold());
        } else {
            println!("\n{}", line);
        }
    }

    /// Print a JSON value, redacting unless secrets are shown.
    pub fn json(&self, value: &Value) {
        println!("{}", self.render_json(value));
    }

    fn render_json(&self, value: &Value) -> String {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        if self.show_secrets {
            text
        } else {
            self.clean(&text)
        }
    }

    /// Print plain text as is.
    pub fn raw(&self, text: &str) {
        print!("{}", self.clean(text));
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        let message = self.clean(message);
        if self.json_mode {
            let error = json!({ "status": "failed", "error": message });
            eprintln!("{}", error);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message.red());
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.json_mode {
            return;
        }

        let message = self.clean(message);
        if self.use_color {
            println!("{}", message.bright_black());
        } else {
            println!("{}", message);
        }
    }
}

/// The JSON document printed for a finished run.
pub fn run_report(stack: &str, provider: &str, run: &StackRun, show_secrets: bool) -> Value {
    let resources: Vec<Value> = run
        .summary
        .resources
        .iter()
        .map(|(urn, state)| {
            json!({
                "urn": urn.as_str(),
                "type": urn.resource_type(),
                "name": urn.name(),
                "id": state.id,
            })
        })
        .collect();

    json!({
        "stack": stack,
        "provider": provider,
        "status": "succeeded",
        "resources": resources,
        "outputs": run.outputs.to_json(show_secrets),
    })
}
