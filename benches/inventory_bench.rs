use cockpit_inventory::device::{DeviceInfo, InMemoryInventory};
use cockpit_inventory::flat::{flat_conditions_to_tree, tree_to_flat_conditions};
use cockpit_inventory::operations::convert_conditions_to_operations;
use cockpit_inventory::parser::parse_command;
use cockpit_inventory::preview::Previewer;
use cockpit_inventory::sql_compiler::SqlCompiler;
use cockpit_inventory::tree::{ConditionTree, Logic, Operator};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

// 构造一棵条件树：根节点下若干条件，外加多层嵌套分组
fn build_tree(leaves: usize, depth: usize) -> ConditionTree {
    let mut tree = ConditionTree::new();
    let roles = ["router", "switch", "firewall"];
    for i in 0..leaves {
        tree.add_condition(&[], "role", Operator::Equals, roles[i % roles.len()])
            .unwrap();
    }
    let mut path = Vec::new();
    for level in 0..depth {
        let id = tree.add_group(&path, Logic::Or, level % 2 == 1).unwrap();
        path.push(id);
        for i in 0..leaves {
            tree.add_condition(&path, "location", Operator::Contains, format!("DC{i}"))
                .unwrap();
        }
    }
    tree
}

// 生成测试设备
fn build_inventory(count: usize) -> InMemoryInventory {
    let roles = ["router", "switch", "firewall"];
    let statuses = ["Active", "Planned", "Offline"];
    let devices = (0..count)
        .map(|i| DeviceInfo {
            id: i.to_string(),
            name: Some(format!("device-{i:05}")),
            role: Some(roles[i % roles.len()].to_string()),
            location: Some(format!("DC{}", i % 10)),
            status: Some(statuses[i % statuses.len()].to_string()),
            tags: vec![format!("rack-{}", i % 40)],
            ..Default::default()
        })
        .collect();
    InMemoryInventory::new(devices)
}

// 基准测试：树扁平化与还原
fn benchmark_flatten(c: &mut Criterion) {
    let test_cases = vec![("small", build_tree(3, 1)), ("medium", build_tree(10, 3)), ("deep", build_tree(20, 8))];

    let mut group = c.benchmark_group("flatten_performance");

    for (name, tree) in &test_cases {
        group.bench_with_input(BenchmarkId::new("tree_to_flat", name), tree, |b, tree| {
            b.iter(|| black_box(tree_to_flat_conditions(black_box(tree))))
        });

        let flat = tree_to_flat_conditions(tree);
        group.bench_with_input(BenchmarkId::new("flat_to_tree", name), &flat, |b, flat| {
            b.iter(|| black_box(flat_conditions_to_tree(black_box(flat))))
        });
    }

    group.finish();
}

// 基准测试：逻辑操作转换与 SQL 编译
fn benchmark_operations_and_sql(c: &mut Criterion) {
    let test_cases = vec![("small", build_tree(3, 1)), ("medium", build_tree(10, 3)), ("deep", build_tree(20, 8))];
    let compiler = SqlCompiler::new();

    let mut group = c.benchmark_group("operations_performance");

    for (name, tree) in &test_cases {
        let flat = tree_to_flat_conditions(tree);
        group.bench_with_input(BenchmarkId::new("convert", name), &flat, |b, flat| {
            b.iter(|| black_box(convert_conditions_to_operations(black_box(flat))))
        });

        let operations = convert_conditions_to_operations(&flat);
        group.bench_with_input(BenchmarkId::new("compile_sql", name), &operations, |b, operations| {
            b.iter(|| match compiler.compile(black_box(operations)) {
                Ok(result) => black_box(result),
                Err(_) => panic!("编译失败"),
            })
        });
    }

    group.finish();
}

// 基准测试：内存设备集上的预览
fn benchmark_preview(c: &mut Criterion) {
    let tree = build_tree(5, 2);
    let operations = convert_conditions_to_operations(&tree_to_flat_conditions(&tree));

    let mut group = c.benchmark_group("preview_performance");

    for size in [100, 1_000, 10_000] {
        let inventory = build_inventory(size);
        group.bench_with_input(BenchmarkId::new("preview", size), &inventory, |b, inventory| {
            let previewer = Previewer::new(inventory, 8);
            b.iter(|| match previewer.preview(black_box(&operations)) {
                Ok(result) => black_box(result),
                Err(_) => panic!("预览失败"),
            })
        });
    }

    group.finish();
}

// 基准测试：命令解析
fn benchmark_command_parser(c: &mut Criterion) {
    let test_cases = vec![
        ("simple", "show"),
        ("add", "add role equals router"),
        ("quoted", r#"add name contains "core rtr 01""#),
        ("save", r#"save inventories/dc1.json "DC1 routers and switches""#),
    ];

    let mut group = c.benchmark_group("parser_performance");

    for (name, line) in test_cases {
        group.bench_with_input(BenchmarkId::new("parse", name), &line, |b, &line| {
            b.iter(|| match parse_command(black_box(line)) {
                Ok(command) => black_box(command),
                Err(_) => panic!("解析失败"),
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_flatten,
    benchmark_operations_and_sql,
    benchmark_preview,
    benchmark_command_parser
);
criterion_main!(benches);
