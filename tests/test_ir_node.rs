use galena::ir::{Graph, Mode, Node, NodeOp, Span};

#[test]
fn test_def_use_tracking() {
    let mut g = Graph::new();
    let span = Span::default();
    let blk = g.start_block();

    let x = Node::arg(&mut g, span, 0, Mode::U32);
    let y = Node::arg(&mut g, span, 1, Mode::U32);

    let n = Node::and_(&mut g, span, blk, x, y);

    assert_eq!(n.op(&g), NodeOp::And);
    assert_eq!(n.inputs(&g), &[x, y]);
    assert_eq!(x.users(&g), vec![n]);
    assert_eq!(y.users(&g), vec![n]);
    assert!(n.users(&g).is_empty());
}

#[test]
fn test_out_edges_count_multiplicity() {
    let mut g = Graph::new();
    let span = Span::default();
    let blk = g.start_block();

    let x = Node::arg(&mut g, span, 0, Mode::U32);
    let y = Node::arg(&mut g, span, 1, Mode::U32);

    let nx = Node::not_(&mut g, span, blk, x);
    let e = Node::eor(&mut g, span, blk, x, nx);

    // x is used once by the not and once by the eor
    assert_eq!(x.n_outs(&g), 2);
    assert_eq!(nx.n_outs(&g), 1);

    // an operation using the same node through two slots counts two edges
    let o = Node::or_(&mut g, span, blk, e, y);
    o.set_input(&mut g, 1, e);
    assert_eq!(e.n_outs(&g), 2);
    assert_eq!(e.users(&g), vec![o]);
    assert_eq!(y.n_outs(&g), 0);
}

#[test]
fn test_exchange_rewires_users() {
    let mut g = Graph::new();
    let span = Span::default();
    let blk = g.start_block();

    let x = Node::arg(&mut g, span, 0, Mode::U32);
    let y = Node::arg(&mut g, span, 1, Mode::U32);
    let z = Node::arg(&mut g, span, 2, Mode::U32);

    let old = Node::and_(&mut g, span, blk, x, y);
    let user = Node::or_(&mut g, span, blk, old, z);

    g.exchange(old, z);

    assert!(old.is_deleted(&g));
    assert_eq!(user.inputs(&g), &[z, z]);
    assert!(x.users(&g).is_empty());
    assert!(y.users(&g).is_empty());
    assert_eq!(z.n_outs(&g), 2);

    // tombstones are reclaimed by the graph
    let before = g.nodes().len();
    g.sweep();
    assert_eq!(g.nodes().len(), before - 1);
}

#[test]
fn test_display() {
    let mut g = Graph::new();
    let span = Span::default();
    let blk = g.start_block();

    let x = Node::arg(&mut g, span, 0, Mode::I32);
    let c = Node::iconst(&mut g, span, 2, Mode::I32);
    let n = Node::mul(&mut g, span, blk, x, c);

    let s = format!("{}", n.display(&g));
    assert_eq!(s, format!("%{} = mul %{}, %{} : i32", n.id(), x.id(), c.id()));

    let s = format!("{}", c.display(&g));
    assert_eq!(s, format!("%{} = const 0x2:i32 : i32", c.id()));

    let rendered = format!("{}", g.display());
    assert!(rendered.contains("mul"));
    assert!(rendered.contains("arg 0"));
}
