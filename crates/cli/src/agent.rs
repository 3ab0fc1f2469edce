//! `nimbus agent ...` commands

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use nimbus_core::domain::Value;
use nimbus_ovm::{
    CloudStackPlugin, Common, Connection, ConnectionConfig, Linux, Network, Ntp, Pool,
    Repository, Xen, DOMR_SSH_PORT,
};
use std::fmt::Display;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum AgentCommand {
    /// Call a set of read-only methods and report each result
    Smoke,

    /// Echo a message through the agent
    Echo { message: String },

    /// Show server identity and pool membership
    Server,

    /// Show CPU and memory
    Hardware,

    /// List network interfaces
    Network,

    /// List virtual machines
    Vms,

    /// Show one VM's configuration
    Vm { repo: String, vm: String },

    /// Start a VM
    StartVm { repo: String, vm: String },

    /// Stop a VM
    StopVm {
        repo: String,
        vm: String,

        /// Destroy instead of a clean shutdown
        #[arg(long)]
        force: bool,
    },

    /// Reboot a VM
    RebootVm {
        repo: String,
        vm: String,

        /// Seconds to wait for the guest to go down
        #[arg(long, default_value = "60")]
        wait: u32,
    },

    /// Show server pool membership
    Pool,

    /// Show NTP settings
    Ntp,

    /// List storage repositories
    Repos {
        /// Only these repository ids
        ids: Vec<String>,
    },

    /// Check that a router VM answers on a port
    DomrCheck {
        ip: String,

        /// Port to probe (default: router SSH port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Call any agent method with JSON arguments
    Call {
        method: String,

        /// Positional arguments; anything that is not JSON is sent as a string
        args: Vec<String>,
    },
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct InterfaceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Ports")]
    ports: String,
}

#[derive(Tabled)]
struct VmRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Dom ID")]
    domid: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Memory (MiB)")]
    memory: String,
    #[tabled(rename = "vCPUs")]
    vcpus: String,
}

#[derive(Tabled)]
struct RepoRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Alias")]
    alias: String,
    #[tabled(rename = "Mount point")]
    mount_point: String,
    #[tabled(rename = "Free (GiB)")]
    free: String,
}

fn or_dash<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

fn print_outcome(what: &str, ok: bool) -> Result<()> {
    if ok {
        println!("{}", format!("✓ {}", what).green().bold());
        Ok(())
    } else {
        bail!("agent reported failure: {}", what)
    }
}

/// JSON if it parses, otherwise a plain string
fn parse_arg(raw: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(raw))
}

fn report<T: Display>(name: &str, result: nimbus_core::Result<T>, failed: &mut usize) {
    match result {
        Ok(summary) => println!("  {} {:<20} {}", "✓".green(), name, summary),
        Err(e) => {
            *failed += 1;
            println!("  {} {:<20} {}", "✗".red(), name, e.to_string().red());
        }
    }
}

async fn smoke(conn: &Connection) -> Result<()> {
    println!("{}", format!("Agent {}:{}", conn.host(), conn.port()).cyan().bold());

    let common = Common::new(conn.clone());
    let linux = Linux::new(conn.clone());
    let mut failed = 0;

    report("echo", common.echo("nimbus").await, &mut failed);
    report("get_api_version", common.api_version().await, &mut failed);
    report(
        "discover_server",
        linux
            .discover_server()
            .await
            .map(|s| format!("{} ({})", s.hostname, or_dash(s.ovm_version))),
        &mut failed,
    );
    report(
        "discover_hardware",
        linux
            .discover_hardware()
            .await
            .map(|h| format!("{} threads, {} MiB", h.total_threads(), h.total_memory_mib)),
        &mut failed,
    );
    report(
        "discover_network",
        Network::new(conn.clone())
            .discover()
            .await
            .map(|i| format!("{} interfaces", i.len())),
        &mut failed,
    );
    report(
        "list_vms",
        Xen::new(conn.clone())
            .list_vms()
            .await
            .map(|vms| format!("{} domains", vms.len())),
        &mut failed,
    );
    report(
        "get_ntp",
        Ntp::new(conn.clone())
            .get()
            .await
            .map(|n| format!("{} (running: {})", n.servers.join(", "), n.running)),
        &mut failed,
    );

    const TOTAL: usize = 7;
    println!();
    if failed > 0 {
        bail!("{} of {} checks failed", failed, TOTAL);
    }
    println!("{}", format!("✓ All {} checks passed", TOTAL).green().bold());
    Ok(())
}

pub async fn run(config: &ConnectionConfig, command: AgentCommand) -> Result<()> {
    let conn = Connection::connect(config)
        .with_context(|| format!("Failed to set up connection to {}:{}", config.host, config.port))?;
    info!(host = %conn.host(), port = conn.port(), "Using agent");

    match command {
        AgentCommand::Smoke => smoke(&conn).await?,

        AgentCommand::Echo { message } => {
            println!("{}", Common::new(conn).echo(&message).await?);
        }

        AgentCommand::Server => {
            let s = Linux::new(conn).discover_server().await?;
            print_table(vec![
                FieldRow { field: "Hostname", value: s.hostname },
                FieldRow { field: "Unique ID", value: s.unique_id },
                FieldRow { field: "OVM version", value: or_dash(s.ovm_version) },
                FieldRow { field: "Agent version", value: or_dash(s.agent_version) },
                FieldRow { field: "Membership", value: or_dash(s.membership_state) },
                FieldRow { field: "Pool", value: or_dash(s.pool_id) },
                FieldRow { field: "Manager", value: or_dash(s.manager_id) },
                FieldRow { field: "Master", value: s.is_master.to_string() },
                FieldRow { field: "Registered IP", value: or_dash(s.registered_ip) },
                FieldRow { field: "Roles", value: s.roles.join(", ") },
            ]);
        }

        AgentCommand::Hardware => {
            let h = Linux::new(conn).discover_hardware().await?;
            print_table(vec![
                FieldRow { field: "Sockets", value: h.cpu_sockets.to_string() },
                FieldRow { field: "Cores/socket", value: h.cores_per_socket.to_string() },
                FieldRow { field: "Threads/core", value: h.threads_per_core.to_string() },
                FieldRow { field: "Memory (MiB)", value: h.total_memory_mib.to_string() },
                FieldRow { field: "Free (MiB)", value: h.free_memory_mib.to_string() },
                FieldRow { field: "Manufacturer", value: or_dash(h.manufacturer) },
                FieldRow { field: "Product", value: or_dash(h.product) },
                FieldRow { field: "BIOS", value: or_dash(h.bios_version) },
            ]);
        }

        AgentCommand::Network => {
            let interfaces = Network::new(conn).discover().await?;
            print_table(
                interfaces
                    .into_iter()
                    .map(|i| InterfaceRow {
                        name: i.name,
                        kind: i.kind.to_string(),
                        mac: or_dash(i.mac),
                        address: or_dash(i.address),
                        ports: i.ports.join(", "),
                    })
                    .collect(),
            );
        }

        AgentCommand::Vms => {
            let vms = Xen::new(conn).list_vms().await?;
            print_table(
                vms.into_iter()
                    .map(|vm| VmRow {
                        name: vm.name,
                        domid: or_dash(vm.domid),
                        state: or_dash(vm.state),
                        memory: or_dash(vm.memory_mib),
                        vcpus: or_dash(vm.vcpus),
                    })
                    .collect(),
            );
        }

        AgentCommand::Vm { repo, vm } => {
            let config = Xen::new(conn).vm_config(&repo, &vm).await?;
            print_table(vec![
                FieldRow { field: "Name", value: config.name },
                FieldRow { field: "UUID", value: config.uuid },
                FieldRow { field: "Memory (MiB)", value: config.memory_mib.to_string() },
                FieldRow { field: "Max memory (MiB)", value: config.max_memory_mib.to_string() },
                FieldRow { field: "vCPUs", value: config.vcpus.to_string() },
                FieldRow { field: "Disks", value: config.disks.join("\n") },
                FieldRow { field: "VIFs", value: config.vifs.join("\n") },
                FieldRow { field: "On reboot", value: config.on_reboot },
                FieldRow { field: "On crash", value: config.on_crash },
            ]);
        }

        AgentCommand::StartVm { repo, vm } => {
            let ok = Xen::new(conn).start_vm(&repo, &vm).await?;
            print_outcome(&format!("started {}", vm), ok)?;
        }

        AgentCommand::StopVm { repo, vm, force } => {
            let ok = Xen::new(conn).stop_vm(&repo, &vm, force).await?;
            print_outcome(&format!("stopped {}", vm), ok)?;
        }

        AgentCommand::RebootVm { repo, vm, wait } => {
            let ok = Xen::new(conn).reboot_vm(&repo, &vm, wait).await?;
            print_outcome(&format!("rebooted {}", vm), ok)?;
        }

        AgentCommand::Pool => match Pool::new(conn).discover().await? {
            Some(pool) => print_table(vec![
                FieldRow { field: "Pool ID", value: pool.unique_id },
                FieldRow { field: "Alias", value: or_dash(pool.alias) },
                FieldRow { field: "Master VIP", value: or_dash(pool.master_virtual_ip) },
                FieldRow { field: "Members", value: pool.member_ips.join(", ") },
            ]),
            None => println!("{}", "Host is not in a server pool".yellow()),
        },

        AgentCommand::Ntp => {
            let ntp = Ntp::new(conn).get().await?;
            print_table(vec![
                FieldRow { field: "Servers", value: ntp.servers.join(", ") },
                FieldRow { field: "Running", value: ntp.running.to_string() },
            ]);
        }

        AgentCommand::Repos { ids } => {
            let repos = Repository::new(conn).discover(&ids).await?;
            print_table(
                repos
                    .into_iter()
                    .map(|r| RepoRow {
                        id: r.id,
                        alias: or_dash(r.alias),
                        mount_point: or_dash(r.mount_point),
                        free: or_dash(
                            r.free_bytes
                                .map(|b| format!("{:.1}", b as f64 / (1024.0 * 1024.0 * 1024.0))),
                        ),
                    })
                    .collect(),
            );
        }

        AgentCommand::DomrCheck { ip, port } => {
            let plugin = CloudStackPlugin::new(conn);
            let port = port.unwrap_or(DOMR_SSH_PORT);
            let open = if port == DOMR_SSH_PORT {
                plugin.domr_check_ssh(&ip).await?
            } else {
                plugin.domr_check_port(&ip, port, 7, 2).await?
            };
            print_outcome(&format!("{}:{} reachable", ip, port), open)?;
        }

        AgentCommand::Call { method, args } => {
            let params = args.iter().map(|a| parse_arg(a)).collect();
            let result = conn.call(&method, params).await?;
            println!("{}", serde_json::to_string_pretty(&result.to_json())?);
        }
    }

    Ok(())
}
