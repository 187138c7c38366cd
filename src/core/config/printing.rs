use crate::core::config::data::Config;

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.model {
            Some(model) => println!("  model: {model}"),
            None => println!("  model: (unset, using {})", self.effective_model(None)),
        }
        match &self.base_url {
            Some(url) => println!("  base-url: {url}"),
            None => println!("  base-url: (unset, using {})", self.effective_base_url()),
        }
        match &self.system_prompt {
            Some(prompt) => println!("  system-prompt: {} chars", prompt.chars().count()),
            None => println!("  system-prompt: (built-in)"),
        }
        match self.mood {
            Some(mood) => println!("  mood: {mood}"),
            None => println!("  mood: (unset, using {})", self.effective_mood()),
        }
    }
}
