use colored::Colorize;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_signal(topic: &str, tags: &[String]) {
    println!("{} {}: {}", "→".cyan(), topic.bold(), tags.join(", "));
}
