use galena::{
    ir::{passes::dominance_analysis::DominanceAnalysis, passman::GraphPass, Block, Graph},
    utils::dominance::Dominance,
};

#[test]
fn test_dominance_0() {
    let mut g = Graph::new();
    let bb0 = g.start_block();
    let bb1 = Block::new(&mut g);
    let bb2 = Block::new(&mut g);
    let bb3 = Block::new(&mut g);
    let bb4 = Block::new(&mut g);

    //       bb0
    //       / \
    //      /   \
    //    bb1   bb2
    //    /       \
    //  bb3 <---- bb4 <-+
    //   |              |
    //   |              |
    //   +--------------+
    //

    bb0.add_succ(&mut g, bb1);
    bb0.add_succ(&mut g, bb2);
    bb1.add_succ(&mut g, bb3);
    bb2.add_succ(&mut g, bb4);

    bb3.add_succ(&mut g, bb4);
    bb4.add_succ(&mut g, bb3);

    let dominance = Dominance::new(&g);

    assert_eq!(dominance.idom(bb0), None);
    assert_eq!(dominance.idom(bb1), Some(bb0));
    assert_eq!(dominance.idom(bb2), Some(bb0));
    assert_eq!(dominance.idom(bb3), Some(bb0));
    assert_eq!(dominance.idom(bb4), Some(bb0));

    assert!(dominance.dominates(bb0, bb0));
    assert!(dominance.dominates(bb0, bb3));
    assert!(dominance.dominates(bb0, bb4));
    assert!(!dominance.dominates(bb1, bb3));
    assert!(!dominance.dominates(bb3, bb4));

    assert_eq!(dominance.rpo()[0], bb0);
}

#[test]
fn test_dominance_straight_line() {
    let mut g = Graph::new();
    let bb0 = g.start_block();
    let bb1 = Block::new(&mut g);
    let bb2 = Block::new(&mut g);

    bb0.add_succ(&mut g, bb1);
    bb1.add_succ(&mut g, bb2);

    let dominance = Dominance::new(&g);

    assert_eq!(dominance.idom(bb1), Some(bb0));
    assert_eq!(dominance.idom(bb2), Some(bb1));

    assert!(dominance.dominates(bb0, bb2));
    assert!(dominance.dominates(bb1, bb2));
    assert!(!dominance.dominates(bb2, bb1));

    assert_eq!(dominance.rpo(), &[bb0, bb1, bb2]);
}

#[test]
fn test_dominance_analysis_pass() {
    let mut g = Graph::new();
    let bb0 = g.start_block();
    let bb1 = Block::new(&mut g);
    let bb2 = Block::new(&mut g);
    let bb3 = Block::new(&mut g);

    bb0.add_succ(&mut g, bb1);
    bb0.add_succ(&mut g, bb2);
    bb1.add_succ(&mut g, bb3);
    bb2.add_succ(&mut g, bb3);

    let mut analysis = DominanceAnalysis;
    let dominance = analysis.run(&g).unwrap();

    assert_eq!(dominance.idom(bb1), Some(bb0));
    assert_eq!(dominance.idom(bb2), Some(bb0));
    assert_eq!(dominance.idom(bb3), Some(bb0));
}

#[test]
fn test_dominance_unreachable() {
    let mut g = Graph::new();
    let bb0 = g.start_block();
    let bb1 = Block::new(&mut g);
    let orphan = Block::new(&mut g);

    bb0.add_succ(&mut g, bb1);

    let dominance = Dominance::new(&g);

    assert!(!dominance.is_reachable(orphan));
    assert!(!dominance.dominates(bb0, orphan));
    assert!(!dominance.dominates(orphan, bb1));
}
