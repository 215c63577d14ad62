use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use cheese_maze::core::types::Position;
use cheese_maze::decision::strategies::{LocalStrategyProvider, StrategyKind};
use cheese_maze::entity::agent::{Agent, AgentSpec, Vitals};
use cheese_maze::rules::effects::{apply_turn_effects, TurnContext};
use cheese_maze::rules::ruleset::{Ruleset, RulesetMode};
use cheese_maze::simulation::run::{Run, RunConfig};
use cheese_maze::simulation::turn::{commit_turn, plan_turn, TurnPlan};
use cheese_maze::world::loader::builtin_maze;

fn bench_turn_effects(c: &mut Criterion) {
    let rules = Ruleset::default().with_mode(RulesetMode::AttritionLethal);
    let mut agent = Agent::new("Remy", Position::new(1, 1), Vitals::full(100, 100), 500);
    agent.total_moves = 5;
    let ctx = TurnContext {
        resource_found: true,
        neighbor_nearby: true,
        moved: true,
    };

    c.bench_function("apply_turn_effects", |b| {
        b.iter(|| apply_turn_effects(black_box(&agent), black_box(&rules), black_box(ctx)))
    });
}

fn bench_lockstep_ticks(c: &mut Criterion) {
    let maze = builtin_maze("complex").expect("bundled maze parses");
    let agents: Vec<AgentSpec> = (0..8).map(|i| AgentSpec::named(format!("Mouse {}", i))).collect();
    let config = RunConfig::new(maze, Ruleset::default(), agents);
    let strategy = LocalStrategyProvider::new(StrategyKind::Random, 0xC0FFEE);
    let ticks = 64;

    let mut group = c.benchmark_group("lockstep");
    group.bench_function(format!("{}_ticks_8_agents", ticks), |b| {
        b.iter_batched(
            || {
                let mut run = Run::new(&config).expect("valid config");
                run.begin().expect("idle run starts");
                run
            },
            |mut run| {
                for _ in 0..ticks {
                    run.turn += 1;
                    for index in 0..run.agents.len() {
                        let direction = match plan_turn(&run, index).expect("agent exists") {
                            TurnPlan::Skip => continue,
                            TurnPlan::Collect => None,
                            TurnPlan::Decide(obs) => Some(strategy.choose(&obs)),
                        };
                        let _ = commit_turn(&mut run, index, direction, 2);
                    }
                }
                black_box(run)
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_turn_effects, bench_lockstep_ticks);
criterion_main!(benches);
