//! 设备筛选条件的交互式编辑器
//!
//! 读取一行命令，解析为 [`Command`] 并作用于当前会话。

use anyhow::{bail, Context, Result};
use clap::Parser as _;
use cockpit_inventory::ast::Command;
use cockpit_inventory::parser::{parse_command, ParseError};
use cockpit_inventory::schema::InventoryAnalysis;
use cockpit_inventory::{
    ExportDocument, InMemoryInventory, InventoryConfig, LogicSlot, Previewer, SavedInventory, Session,
    SqlCompiler,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
命令:
  add <field> <operator> <value>   在当前分组中添加条件
  group <and|or> [not]             在当前分组中新建分组
  enter <group-id>                 切换到分组
  root                             回到根节点
  rm <id>                          删除条件或分组
  logic <group-id> <and|or>        分组与前面节点的连接逻辑
  inner <group-id> <and|or>        分组内部的组合逻辑
  combine <and|or>                 根节点的组合逻辑
  show | flat | ops                查看条件树 / 扁平列表 / 逻辑操作
  preview | sql                    预览匹配设备 / 生成 SQL
  fields | values <field>          可用字段 / 字段候选值
  save <file> <name>               保存为扁平格式
  load <file>                      加载已保存的条件
  export <file> <name>             导出 (version 2)
  import <file>                    导入 (version 2)
  clear | help | quit";

#[derive(clap::Parser, Debug)]
#[command(name = "cockpit-inventory", version, about = "设备筛选条件编辑器")]
struct Cli {
    /// JSON 配置文件，缺失或无效时使用默认配置
    #[arg(long, default_value = "cockpit.json")]
    config: PathBuf,

    /// 用于预览的设备 JSON 文件
    #[arg(long)]
    devices: Option<PathBuf>,

    /// 命令历史文件
    #[arg(long, default_value = ".cockpit_history")]
    history: PathBuf,
}

/// 编辑器状态
struct Shell {
    config: InventoryConfig,
    session: Session,
    inventory: Option<InMemoryInventory>,
    analysis: Option<InventoryAnalysis>,
}

enum Flow {
    Continue,
    Quit,
}

impl Shell {
    fn new(config: InventoryConfig, inventory: Option<InMemoryInventory>) -> Self {
        let analysis = inventory
            .as_ref()
            .map(|inventory| InventoryAnalysis::analyze(inventory.devices()));
        Self {
            session: Session::with_max_depth(config.max_depth),
            config,
            inventory,
            analysis,
        }
    }

    fn prompt(&self) -> String {
        match self.session.current_group() {
            Some(group) => format!("inventory [{group}]> "),
            None => "inventory> ".to_string(),
        }
    }

    fn execute(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Add {
                field,
                operator,
                value,
            } => {
                self.config.fields.check(&field, operator)?;
                let id = self.session.add_condition(field, operator, value)?;
                println!("✅ 已添加 {id}");
            }
            Command::Group { logic, negate } => {
                let id = self.session.add_group(logic, negate)?;
                println!("✅ 已创建分组 {id}，使用 enter {id} 进入");
            }
            Command::Enter(id) => {
                self.session.set_target_group(Some(&id))?;
                println!("当前分组: {id}");
            }
            Command::Root => {
                self.session.set_target_group(None)?;
                println!("当前分组: root");
            }
            Command::Remove(id) => {
                if self.session.remove_item(&id) {
                    println!("✅ 已删除 {id}");
                } else {
                    println!("⚠️ 未找到 {id}");
                }
            }
            Command::Logic { group, logic } => {
                if !self.session.update_group_logic(&group, LogicSlot::Logic, logic) {
                    println!("⚠️ 未更新: {group} 不存在或是 NOT 分组");
                }
            }
            Command::Inner { group, logic } => {
                if !self.session.update_group_logic(&group, LogicSlot::Internal, logic) {
                    println!("⚠️ 未找到分组 {group}");
                }
            }
            Command::Combine(logic) => self.session.set_root_logic(logic),
            Command::Show => print!("{}", self.session.tree()),
            Command::Flat => {
                let conditions = self.session.flat_conditions();
                println!("{}", cockpit_inventory::flat::to_json(&conditions)?);
            }
            Command::Ops => {
                let operations = self.session.operations()?;
                println!("{}", serde_json::to_string_pretty(&operations)?);
            }
            Command::Preview => self.preview()?,
            Command::Sql => {
                let operations = self.session.operations()?;
                let compiler = SqlCompiler::from_config(self.config.compiler_config());
                let result = compiler.compile(&operations)?;
                println!("{}", result.sql);
                for optimization in &result.optimizations {
                    println!("• {optimization:?}");
                }
            }
            Command::Fields => {
                for field in &self.config.fields.fields {
                    let operators: Vec<_> = field.operators.iter().map(|op| op.as_str()).collect();
                    println!("  {:<14} {:<16} {}", field.name, field.display_label(), operators.join(", "));
                }
                println!("  cf_<name>      自定义字段");
            }
            Command::Values(field) => {
                let values = self.config.fields.suggestions(&field, self.analysis.as_ref());
                if values.is_empty() {
                    println!("(无候选值)");
                }
                for value in values {
                    println!("  {value}");
                }
            }
            Command::Save { path, name } => {
                SavedInventory::from_flat(name, self.session.flat_conditions()).save_to_file(&path)?;
                println!("✅ 已保存到 {}", path.display());
            }
            Command::Load(path) => {
                let record = SavedInventory::load_from_file(&path)?;
                let tree = record.to_tree(self.config.max_depth)?;
                self.session.replace_tree(tree)?;
                println!("✅ 已加载 {}", record.name);
            }
            Command::Export { path, name } => {
                let exported_by = std::env::var("USER").unwrap_or_else(|_| "cockpit".to_string());
                SavedInventory::from_tree(name, self.session.tree().clone())
                    .export(&exported_by, None)
                    .write_to_file(&path)?;
                println!("✅ 已导出到 {}", path.display());
            }
            Command::Import(path) => {
                let record = ExportDocument::read_from_file(&path)?.import(self.config.max_depth)?;
                let tree = record.to_tree(self.config.max_depth)?;
                self.session.replace_tree(tree)?;
                println!("✅ 已导入 {}", record.name);
            }
            Command::Clear => self.session.clear(),
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn preview(&self) -> Result<()> {
        let operations = self.session.operations()?;
        let Some(inventory) = &self.inventory else {
            bail!("未加载设备数据，请使用 --devices 指定");
        };
        let result = Previewer::new(inventory, self.config.max_depth).preview(&operations)?;
        for device in &result.devices {
            println!(
                "  {:<20} {:<12} {:<12} {}",
                device.display_name(),
                device.role.as_deref().unwrap_or("-"),
                device.location.as_deref().unwrap_or("-"),
                device.status.as_deref().unwrap_or("-"),
            );
        }
        println!(
            "共 {} 台设备（执行了 {} 个条件查询）",
            result.total_count, result.operations_executed
        );
        Ok(())
    }
}

fn report_parse_error(line: &str, error: &ParseError) {
    println!("✗ 解析失败: {}", error.message);
    if let Some(span) = error.span {
        let width = line[span.start..span.end].chars().count().max(1);
        let offset = line[..span.start].chars().count();
        println!("  {line}");
        println!("  {}{}", " ".repeat(offset), "^".repeat(width));
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = InventoryConfig::load_or_default(&cli.config);
    let inventory = cli
        .devices
        .as_ref()
        .map(|path| {
            InMemoryInventory::from_json_file(path)
                .with_context(|| format!("无法加载设备数据 {}", path.display()))
        })
        .transpose()?;
    if let Some(inventory) = &inventory {
        info!(devices = inventory.len(), "设备数据已加载");
    }

    let mut shell = Shell::new(config, inventory);
    let mut editor = DefaultEditor::new().context("无法初始化命令行编辑器")?;
    if editor.load_history(&cli.history).is_err() {
        info!(path = %cli.history.display(), "没有历史记录");
    }

    println!("--- Cockpit 设备筛选条件编辑器 (输入 help 查看命令) ---");
    loop {
        match editor.readline(&shell.prompt()) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(e) = editor.add_history_entry(line.as_str()) {
                    debug!("无法记录历史: {e}");
                }
                let command = match parse_command(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        report_parse_error(&line, &e);
                        continue;
                    }
                };
                match shell.execute(command) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => break,
                    Err(e) => println!("❌ {e:#}"),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("读取输入失败"),
        }
    }

    if let Err(e) = editor.save_history(&cli.history) {
        warn!("无法保存历史记录: {e}");
    }
    Ok(())
}
