pub mod psexe;
