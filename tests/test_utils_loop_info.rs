use galena::{
    ir::{
        passes::loop_analysis::LoopAnalysis,
        passman::GraphPass,
        Block,
        Graph,
        GraphProperties,
    },
    utils::{dominance::Dominance, loop_info::LoopContext},
};

#[test]
fn test_loop_info_simple() {
    let mut g = Graph::new();
    let entry = g.start_block();
    let header = Block::new(&mut g);
    let body = Block::new(&mut g);
    let exit = Block::new(&mut g);

    //  entry -> header -> exit
    //             ^  \
    //             |   v
    //             +- body

    entry.add_succ(&mut g, header);
    header.add_succ(&mut g, body);
    header.add_succ(&mut g, exit);
    body.add_succ(&mut g, header);

    let dominance = Dominance::new(&g);
    let loops = LoopContext::new(&g, &dominance);

    let lp = loops.get_loop(header).expect("header should be in a loop");
    assert_eq!(lp.header(&loops), header);
    assert_eq!(lp.depth(&loops), 1);
    assert_eq!(lp.parent(&loops), None);

    assert_eq!(loops.get_loop(body), Some(lp));
    assert_eq!(loops.get_loop(entry), None);
    assert_eq!(loops.get_loop(exit), None);

    assert!(loops.is_in_loop(header, lp));
    assert!(loops.is_in_loop(body, lp));
    assert!(!loops.is_in_loop(entry, lp));
}

#[test]
fn test_loop_info_nested() {
    let mut g = Graph::new();
    let entry = g.start_block();
    let h1 = Block::new(&mut g);
    let b1 = Block::new(&mut g);
    let h2 = Block::new(&mut g);
    let b2 = Block::new(&mut g);
    let latch = Block::new(&mut g);
    let exit = Block::new(&mut g);

    // outer loop headed by h1, inner loop headed by h2
    entry.add_succ(&mut g, h1);
    h1.add_succ(&mut g, b1);
    h1.add_succ(&mut g, exit);
    b1.add_succ(&mut g, h2);
    h2.add_succ(&mut g, b2);
    b2.add_succ(&mut g, h2);
    h2.add_succ(&mut g, latch);
    latch.add_succ(&mut g, h1);

    let dominance = Dominance::new(&g);
    let loops = LoopContext::new(&g, &dominance);

    let outer = loops.get_loop(h1).expect("outer loop");
    let inner = loops.get_loop(h2).expect("inner loop");
    assert_ne!(outer, inner);

    assert_eq!(inner.parent(&loops), Some(outer));
    assert_eq!(outer.parent(&loops), None);
    assert_eq!(outer.depth(&loops), 1);
    assert_eq!(inner.depth(&loops), 2);

    assert_eq!(loops.get_loop(b1), Some(outer));
    assert_eq!(loops.get_loop(b2), Some(inner));
    assert_eq!(loops.get_loop(latch), Some(outer));
    assert_eq!(loops.get_loop(exit), None);

    // the inner body is in both loops, the outer body only in the outer
    assert!(loops.is_in_loop(b2, outer));
    assert!(loops.is_in_loop(b2, inner));
    assert!(loops.is_in_loop(b1, outer));
    assert!(!loops.is_in_loop(b1, inner));
}

#[test]
fn test_loop_analysis_pass_requires_dominance() {
    let mut g = Graph::new();
    let entry = g.start_block();
    let header = Block::new(&mut g);
    let body = Block::new(&mut g);
    let exit = Block::new(&mut g);

    entry.add_succ(&mut g, header);
    header.add_succ(&mut g, body);
    header.add_succ(&mut g, exit);
    body.add_succ(&mut g, header);

    let mut analysis = LoopAnalysis;

    // without consistent dominance the analysis refuses to run
    assert!(analysis.run(&g).is_err());

    g.assure_properties(GraphProperties::CONSISTENT_DOMINANCE);
    let loops = analysis.run(&g).unwrap();

    let lp = loops.get_loop(header).expect("header should be in a loop");
    assert_eq!(lp.header(&loops), header);
    assert_eq!(loops.get_loop(body), Some(lp));
}

#[test]
fn test_loop_invariance() {
    let mut g = Graph::new();
    let entry = g.start_block();
    let header = Block::new(&mut g);
    let body = Block::new(&mut g);
    let exit = Block::new(&mut g);

    entry.add_succ(&mut g, header);
    header.add_succ(&mut g, body);
    header.add_succ(&mut g, exit);
    body.add_succ(&mut g, header);

    use galena::ir::{Mode, Node, Span};

    let span = Span::default();
    let p = Node::arg(&mut g, span, 0, Mode::P);
    let inside = Node::load(&mut g, span, body, Mode::I32, p);

    g.assure_properties(
        GraphProperties::CONSISTENT_DOMINANCE | GraphProperties::CONSISTENT_LOOPINFO,
    );
    assert!(g.dominance().is_some());
    assert!(g.loop_info().is_some());

    // a start-block value is invariant relative to the loop, a value computed
    // in the body is not
    assert!(g.is_loop_invariant(p, body));
    assert!(!g.is_loop_invariant(inside, body));
    assert!(!g.is_loop_invariant(inside, header));

    // without an enclosing loop nothing counts as invariant
    assert!(!g.is_loop_invariant(p, entry));
    assert!(!g.is_loop_invariant(p, exit));
}
