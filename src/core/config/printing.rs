use std::fmt::Write as _;

use crate::core::config::data::Config;

fn or_unset(value: Option<&str>) -> &str {
    value.unwrap_or("(unset)")
}

impl Config {
    pub fn describe(&self) -> String {
        let mut out = String::from("Current configuration:\n");
        let _ = writeln!(out, "  base-url: {}", self.base_url());
        let _ = writeln!(out, "  endpoint: {}", self.endpoint());
        let _ = writeln!(
            out,
            "  stream: {}",
            if self.stream_enabled() { "on" } else { "off" }
        );
        let _ = writeln!(out, "  greeting: {}", self.greeting().unwrap_or("(none)"));
        let _ = writeln!(
            out,
            "  system-prompt: {}",
            or_unset(self.system_prompt.as_deref())
        );
        let _ = writeln!(out, "  refine-prefix: {}", self.refine_prefix());
        let _ = writeln!(
            out,
            "  refine-instructions: {}",
            if self.refine_instructions.is_some() {
                "custom"
            } else {
                "default"
            }
        );
        match self.connect_timeout_secs {
            Some(secs) => {
                let _ = writeln!(out, "  connect-timeout: {secs}s");
            }
            None => {
                let _ = writeln!(out, "  connect-timeout: (unset)");
            }
        }
        out
    }

    pub fn print_all(&self) {
        print!("{}", self.describe());
    }
}
