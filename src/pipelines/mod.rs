pub mod compare;
pub mod illumina;
pub mod long_reads;
pub mod table;
