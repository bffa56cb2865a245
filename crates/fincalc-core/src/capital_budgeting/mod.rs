pub mod cash_flows;
