use porosim::extract::parse_results_csv;

#[test]
fn primary_metric_comes_from_last_record() {
    let csv = "iter,K,R,alpha,mesh\n100,1.0e-12,0.5,0.7,1\n200,2.5e-12,1e-7,0.7,2\n";
    let (records, primary) = parse_results_csv(csv).expect("parse");
    assert_eq!(records.len(), 2);
    assert_eq!(primary, Some(2.5e-12));
    assert_eq!(records[1].iteration, 200);
    assert_eq!(records[1].mesh, 2);
}

#[test]
fn header_only_is_an_error() {
    let err = parse_results_csv("iter,K,R,alpha,mesh\n").unwrap_err();
    assert!(err.to_string().contains("no data rows"));
}

#[test]
fn empty_file_is_an_error() {
    assert!(parse_results_csv("").is_err());
}

#[test]
fn unparsable_primary_on_every_row_yields_none() {
    let csv = "iter,K,R,alpha,mesh\n1,nan?,0.5,0.7,1\n2,--,0.4,0.7,1\n";
    let (records, primary) = parse_results_csv(csv).expect("parse");
    assert_eq!(records.len(), 2);
    assert_eq!(primary, None);
}

#[test]
fn unparsable_primary_on_last_row_falls_back_to_earlier_record() {
    let csv = "iter,K,R,alpha,mesh\n1,3.0e-12,0.5,0.7,1\n2,oops,0.4,0.7,1\n";
    let (_, primary) = parse_results_csv(csv).expect("parse");
    assert_eq!(primary, Some(3.0e-12));
}

#[test]
fn unparsable_secondary_cells_default_to_zero() {
    let csv = "iter,K,R,alpha,mesh\nbad,1e-12,bad,bad,bad\n";
    let (records, _) = parse_results_csv(csv).expect("parse");
    assert_eq!(records[0].iteration, 0);
    assert_eq!(records[0].residual, 0.0);
    assert_eq!(records[0].alpha, 0.0);
    assert_eq!(records[0].mesh, 0);
    assert_eq!(records[0].permeability, 1e-12);
}

#[test]
fn unknown_columns_are_ignored() {
    let csv = "iter,K,extra\n5,1e-11,whatever\n";
    let (records, primary) = parse_results_csv(csv).expect("parse");
    assert_eq!(records[0].iteration, 5);
    assert_eq!(primary, Some(1e-11));
}
