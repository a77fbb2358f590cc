//! UI utilities for the client.

use std::{io::Write, time::Duration};

pub const PROMPT: &str = "haiso> ";

/// Redisplay the prompt after receiving a message
pub fn redisplay_prompt() {
    print!("{}", PROMPT);
    std::io::stdout().flush().ok();
}

/// Print a block of output and restore the prompt
pub fn print_block(text: &str) {
    print!("{}", text);
    redisplay_prompt();
}

pub fn show_connected(rooms: usize) {
    print_block(&format!("\n* online ({} room(s) restored)\n", rooms));
}

/// "reconnecting" indicator shown while the controller backs off
pub fn show_reconnecting(delay: Duration, attempt: u32, max_attempts: u32) {
    print_block(&format!(
        "\n~ reconnecting in {:.1}s (attempt {}/{})...\n",
        delay.as_secs_f64(),
        attempt,
        max_attempts
    ));
}
