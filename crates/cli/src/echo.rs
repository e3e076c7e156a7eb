use owo_colors::OwoColorize;

use contxt_core::RenderedPage;

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!(
        "\n{} {} {}",
        "contxt".bold().bright_blue(),
        "v".dimmed(),
        VERSION.dimmed()
    );
    eprintln!("{}", "Web pages as LLM-ready context\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.bright_red());
}

/// Print timing information with color coding
pub fn print_timing(label: &str, duration: std::time::Duration) {
    let ms = duration.as_secs_f64() * 1000.0;
    let label = format!("{}:", label);

    if ms < 50.0 {
        eprintln!("  {} {:>8.2}ms ({})\n", label.dimmed(), ms, "fast".dimmed());
    } else if ms < 100.0 {
        eprintln!("  {} {:>8.2}ms ({})\n", label.dimmed(), ms, "moderate".bright_yellow());
    } else {
        eprintln!("  {} {:>8.2}ms ({})\n", label.dimmed(), ms, "slow".bright_red());
    }
}

/// Print what was read and produced for one page
pub fn print_page_details(page: &RenderedPage, input_bytes: usize) {
    eprintln!("  {} {}", "Size:".dimmed(), format_size(input_bytes).bright_white());
    eprintln!("  {} {}", "Title:".dimmed(), page.metadata.display_title().bright_white());
    eprintln!("  {} {}", "Images:".dimmed(), page.images.len().to_string().bright_white());
    eprintln!(
        "  {} {}",
        "Tokens:".dimmed(),
        format!("~{}", page.metadata.token_estimate).bright_white()
    );
}

/// Format file size for display
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
