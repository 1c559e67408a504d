//! MAC scheduler comparison across channel presets

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use subnet_lte_mac::{MacNetworkCore, PolicyReport};
use subnet_lte_sim::{scenarios, SimulationPresets};

fn print_policy_row(report: &PolicyReport, best_bits: u64) {
    let bits = format!("{:>10}", report.bits_sent);
    let bits = if report.bits_sent == best_bits && best_bits > 0 {
        bits.bright_green().bold()
    } else {
        bits.normal()
    };
    let loss = format!("{:>7.1}%", report.mean_packet_loss_ratio);
    let loss = if report.mean_packet_loss_ratio > 10.0 {
        loss.bright_red()
    } else {
        loss.normal()
    };
    println!(
        "  {:<4} {} {:>9} {:>11.1} {:>11.1} {:>9.2} {}",
        report.policy.to_string().bold(),
        bits,
        report.sessions_served,
        report.mean_packet_delay_ms,
        report.mean_scheduler_delay_ms,
        report.mean_retransmissions,
        loss
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    println!("{}", "LTE Sub-Network MAC Simulation".bright_blue().bold());
    println!("{}", "==============================".bright_blue());

    let style = ProgressStyle::with_template("  {bar:40.cyan/blue} {pos:>3}/{len:3} ticks {msg}")?
        .progress_chars("##-");

    for (name, config, plan) in SimulationPresets::all() {
        println!("{}", format!("\n>>> {}", name).bright_green().bold());
        println!(
            "BER baseline: {}  TTI budget: {} bits  frame capacity: {} bits",
            config.ber_baseline,
            config.tti_bit_budget,
            config.mac_frame_capacity()
        );
        println!(
            "Load: {} packets every {} ticks over {} UEs",
            plan.burst_size, plan.burst_interval, plan.ue_count
        );

        let core = MacNetworkCore::simulated(config)?;
        let bar = ProgressBar::new(plan.ticks as u64);
        bar.set_style(style.clone());
        let outcome = scenarios::drive(&core, &plan, |_| bar.inc(1)).await;
        bar.finish_with_message("done");

        println!(
            "Offered {} packets in {} sessions; frames queued {}, retransmitted {}, rejected {}",
            outcome.packets_offered,
            outcome.registrations,
            outcome.profile.queued,
            outcome.profile.retransmitted.to_string().yellow(),
            outcome.profile.rejected.to_string().red()
        );
        println!(
            "  {:<4} {:>10} {:>9} {:>11} {:>11} {:>9} {:>8}",
            "", "bits", "sessions", "delay ms", "sched ms", "retx", "loss"
        );
        let best_bits = outcome
            .report
            .policies
            .iter()
            .map(|p| p.bits_sent)
            .max()
            .unwrap_or(0);
        for report in &outcome.report.policies {
            print_policy_row(report, best_bits);
        }
        println!("{}", "-".repeat(72));
    }

    println!("\n{}", "All simulations complete!".bright_green().bold());
    Ok(())
}
